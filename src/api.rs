use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Response;
use serde::Deserialize;
use tracing::{debug, info};

use crate::overlay::ComposedImage;
use crate::{
    AccessCredentials, Endpoints, Error, OAuthClientProvider, OAuthParameters, Result, SignResult,
};

/// Who the access credentials belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub screen_name: String,
    pub banner_url: Option<String>,
}

#[derive(Deserialize)]
struct VerifyCredentialsResponse {
    screen_name: String,
    #[serde(default)]
    profile_banner_url: Option<String>,
}

/// Publishes a composed banner on the user's profile.
#[async_trait]
pub trait BannerUploader: Send + Sync {
    async fn upload_banner(
        &self,
        credentials: &AccessCredentials,
        image: &ComposedImage,
    ) -> Result<()>;
}

/// The authenticated REST calls made with a user's access credentials.
#[derive(Debug, Clone)]
pub struct BannerApi {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl BannerApi {
    pub fn new(endpoints: Endpoints) -> Self {
        BannerApi::with_client(reqwest::Client::new(), endpoints)
    }

    pub fn with_client(client: reqwest::Client, endpoints: Endpoints) -> Self {
        BannerApi { client, endpoints }
    }

    /// `GET account/verify_credentials`. Until this succeeds, freshly
    /// issued credentials are not considered signed in.
    pub async fn verify_identity(&self, credentials: &AccessCredentials) -> Result<Identity> {
        debug!(endpoint = %self.endpoints.verify_credentials, "verifying credentials");
        let resp = self
            .client
            .clone()
            .oauth1(credentials)
            .get(&self.endpoints.verify_credentials)
            .send()
            .await?;
        let text = ensure_success("verify credentials", resp).await?.text().await?;
        let user: VerifyCredentialsResponse = serde_json::from_str(&text)?;
        Ok(Identity {
            screen_name: user.screen_name,
            banner_url: user.profile_banner_url.filter(|url| !url.is_empty()),
        })
    }

    /// `POST account/update_profile_banner` with the image as a base64 form
    /// field. Every form field is covered by the signature.
    pub async fn update_banner(
        &self,
        credentials: &AccessCredentials,
        image: &ComposedImage,
    ) -> Result<()> {
        debug!(
            endpoint = %self.endpoints.update_banner,
            bytes = image.bytes.len(),
            width = image.width,
            height = image.height,
            "uploading banner"
        );
        let resp = self
            .update_banner_request(credentials, image, OAuthParameters::new())?
            .send()
            .await?;
        ensure_success("banner update", resp).await?;
        info!(reference = %image.reference, "banner updated");
        Ok(())
    }
}

impl BannerApi {
    /// The signed `update_profile_banner` request, ready to send.
    pub(crate) fn update_banner_request<'a>(
        &self,
        credentials: &'a AccessCredentials,
        image: &ComposedImage,
        params: OAuthParameters<'a>,
    ) -> SignResult<reqwest::RequestBuilder> {
        let banner = STANDARD.encode(&image.bytes);
        let height = image.height.to_string();
        let width = image.width.to_string();
        self.client
            .clone()
            .oauth1_with_params(credentials, params)
            .post(&self.endpoints.update_banner)
            .form(&[
                ("banner", banner.as_str()),
                ("height", height.as_str()),
                ("offset_left", "0"),
                ("offset_top", "0"),
                ("width", width.as_str()),
            ])
            .generate_signature()
    }
}

#[async_trait]
impl BannerUploader for BannerApi {
    async fn upload_banner(
        &self,
        credentials: &AccessCredentials,
        image: &ComposedImage,
    ) -> Result<()> {
        self.update_banner(credentials, image).await
    }
}

async fn ensure_success(context: &'static str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => format!("<unreadable body: {}>", e),
    };
    Err(Error::AuthRequest {
        context,
        status,
        body,
    })
}
