use tracing::{debug, info};
use url::Url;

use crate::encode::percent_encode;
use crate::{
    AccessCredentials, CallbackError, ConsumerCredentials, Endpoints, OAuthClientProvider,
    OAuthParameters, RequestTokenPair, Result, TokenReaderFuture, OAUTH_TOKEN_KEY,
    OAUTH_VERIFIER_KEY,
};

const SCREEN_NAME_KEY: &str = "screen_name";
const USER_ID_KEY: &str = "user_id";

/// User credentials issued by the access-token leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub credentials: AccessCredentials,
    pub screen_name: String,
    pub user_id: String,
}

/// Query parameters the provider appends when redirecting to the callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Callback {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
}

impl Callback {
    /// Parse the full redirect URL captured by the browser surface.
    pub fn parse(redirect_url: &str) -> std::result::Result<Self, CallbackError> {
        let url =
            Url::parse(redirect_url).map_err(|e| CallbackError::MalformedUrl(e.to_string()))?;
        let mut callback = Callback::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                OAUTH_TOKEN_KEY => callback.oauth_token = Some(value.into_owned()),
                OAUTH_VERIFIER_KEY => callback.oauth_verifier = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(callback)
    }

    /// The verifier, provided the echoed token is the one that was requested.
    pub fn verifier_for(&self, pair: &RequestTokenPair) -> std::result::Result<&str, CallbackError> {
        if self.oauth_token.as_deref() != Some(pair.token.as_str()) {
            return Err(CallbackError::TokenMismatch {
                received: self.oauth_token.clone(),
            });
        }
        match self.oauth_verifier.as_deref() {
            Some(verifier) if !verifier.is_empty() => Ok(verifier),
            _ => Err(CallbackError::MissingVerifier),
        }
    }
}

/// The three-legged OAuth 1.0a handshake against one provider.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    client: reqwest::Client,
    consumer: ConsumerCredentials,
    endpoints: Endpoints,
}

impl OAuthFlow {
    pub fn new(consumer: ConsumerCredentials, endpoints: Endpoints) -> Self {
        OAuthFlow::with_client(reqwest::Client::new(), consumer, endpoints)
    }

    pub fn with_client(
        client: reqwest::Client,
        consumer: ConsumerCredentials,
        endpoints: Endpoints,
    ) -> Self {
        OAuthFlow {
            client,
            consumer,
            endpoints,
        }
    }

    pub fn consumer(&self) -> &ConsumerCredentials {
        &self.consumer
    }

    /// Step 1: obtain temporary credentials, signed with `consumer_secret&`.
    pub async fn request_token(&self, callback_url: &str) -> Result<RequestTokenPair> {
        debug!(endpoint = %self.endpoints.request_token, "requesting oauth request token");
        let params = OAuthParameters::new().callback(callback_url);
        let resp = self
            .client
            .clone()
            .oauth1_with_params(&self.consumer, params)
            .post(&self.endpoints.request_token)
            .send()
            .parse_oauth_token()
            .await?;
        Ok(RequestTokenPair {
            token: resp.oauth_token,
            token_secret: resp.oauth_token_secret,
        })
    }

    /// Step 2: where the user approves the application. No network call.
    pub fn authorization_url(&self, pair: &RequestTokenPair) -> String {
        format!(
            "{}?{}={}",
            self.endpoints.authorize,
            OAUTH_TOKEN_KEY,
            percent_encode(&pair.token)
        )
    }

    /// Step 3: trade the verifier for access credentials.
    ///
    /// The request token pair is consumed whatever the outcome. A callback
    /// that echoes another token, or carries no verifier, is refused before
    /// anything is signed or sent.
    pub async fn exchange_verifier(
        &self,
        pair: RequestTokenPair,
        callback: &Callback,
    ) -> Result<AccessGrant> {
        let verifier = callback.verifier_for(&pair)?;
        debug!(endpoint = %self.endpoints.access_token, "exchanging oauth verifier");

        let secrets = self.consumer.with_request_token(&pair);
        let mut resp = self
            .client
            .clone()
            .oauth1(&secrets)
            .post(&self.endpoints.access_token)
            .form(&[(OAUTH_VERIFIER_KEY, verifier)])
            .send()
            .parse_oauth_token()
            .await?;

        let screen_name = resp.remain.remove(SCREEN_NAME_KEY).unwrap_or_default();
        let user_id = resp.remain.remove(USER_ID_KEY).unwrap_or_default();
        info!(%screen_name, "oauth access token issued");
        Ok(AccessGrant {
            credentials: self
                .consumer
                .token(resp.oauth_token, resp.oauth_token_secret),
            screen_name,
            user_id,
        })
    }
}
