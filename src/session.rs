use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::handshake::{Callback, OAuthFlow};
use crate::{AccessCredentials, BannerApi, ConsumerCredentials, Endpoints, Result};

/// The part of a signed-in session that is worth persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub access_token: String,
    pub access_token_secret: String,
    pub screen_name: String,
}

/// Opaque persistence for [`StoredCredentials`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<StoredCredentials>>;

    async fn set(&self, credentials: StoredCredentials) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Keeps credentials for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<StoredCredentials>>,
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<StoredCredentials>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn set(&self, credentials: StoredCredentials) -> Result<()> {
        *self.slot.lock().await = Some(credentials);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

/// Presents the authorize page and captures the redirect to the callback.
#[async_trait]
pub trait AuthorizationBrowser: Send + Sync {
    /// The full redirect URL, or `None` when the user did not finish.
    async fn authorize(&self, authorize_url: &str, callback_url: &str) -> Result<Option<String>>;
}

/// A verified, signed-in user.
///
/// Passed explicitly to whatever needs to act on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    credentials: AccessCredentials,
    screen_name: String,
    banner_url: Option<String>,
}

impl Session {
    pub fn new(
        credentials: AccessCredentials,
        screen_name: String,
        banner_url: Option<String>,
    ) -> Self {
        Session {
            credentials,
            screen_name,
            banner_url,
        }
    }

    pub fn credentials(&self) -> &AccessCredentials {
        &self.credentials
    }

    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    /// The user's current banner, if they have one.
    pub fn banner_url(&self) -> Option<&str> {
        self.banner_url.as_deref()
    }
}

/// Signs users in and out.
#[derive(Debug, Clone)]
pub struct Connector {
    flow: OAuthFlow,
    api: BannerApi,
    callback_url: String,
}

impl Connector {
    pub fn new<T: Into<String>>(
        consumer: ConsumerCredentials,
        endpoints: Endpoints,
        callback_url: T,
    ) -> Self {
        Connector::with_client(reqwest::Client::new(), consumer, endpoints, callback_url)
    }

    pub fn with_client<T: Into<String>>(
        client: reqwest::Client,
        consumer: ConsumerCredentials,
        endpoints: Endpoints,
        callback_url: T,
    ) -> Self {
        Connector {
            flow: OAuthFlow::with_client(client.clone(), consumer, endpoints.clone()),
            api: BannerApi::with_client(client, endpoints),
            callback_url: callback_url.into(),
        }
    }

    pub fn api(&self) -> &BannerApi {
        &self.api
    }

    /// Run the whole handshake, verify the new credentials and persist them.
    ///
    /// Returns `Ok(None)` when the user leaves the authorize page without
    /// approving. Nothing is stored unless identity verification succeeds.
    pub async fn connect<B, S>(&self, browser: &B, store: &S) -> Result<Option<Session>>
    where
        B: AuthorizationBrowser + ?Sized,
        S: CredentialStore + ?Sized,
    {
        let pair = self.flow.request_token(&self.callback_url).await?;
        let authorize_url = self.flow.authorization_url(&pair);

        let redirect = match browser.authorize(&authorize_url, &self.callback_url).await? {
            Some(redirect) => redirect,
            None => {
                info!("authorization was not completed");
                return Ok(None);
            }
        };
        let callback = Callback::parse(&redirect)?;
        let grant = self.flow.exchange_verifier(pair, &callback).await?;

        let identity = self.api.verify_identity(&grant.credentials).await?;
        let screen_name = if grant.screen_name.is_empty() {
            identity.screen_name
        } else {
            grant.screen_name
        };

        store
            .set(StoredCredentials {
                access_token: grant.credentials.access_token().to_string(),
                access_token_secret: grant.credentials.access_token_secret().to_string(),
                screen_name: screen_name.clone(),
            })
            .await?;
        info!(%screen_name, "signed in");
        Ok(Some(Session::new(
            grant.credentials,
            screen_name,
            identity.banner_url,
        )))
    }

    /// Rebuild a session from stored credentials.
    ///
    /// Credentials the provider rejects (401/403) are cleared from the store;
    /// other failures leave the store alone and are returned.
    pub async fn restore<S>(&self, store: &S) -> Result<Option<Session>>
    where
        S: CredentialStore + ?Sized,
    {
        let stored = match store.get().await? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        let credentials = self
            .flow
            .consumer()
            .token(stored.access_token, stored.access_token_secret);

        match self.api.verify_identity(&credentials).await {
            Ok(identity) => Ok(Some(Session::new(
                credentials,
                stored.screen_name,
                identity.banner_url,
            ))),
            Err(err) if err.is_unauthorized() => {
                warn!(error = %err, "stored credentials were rejected, clearing them");
                store.clear().await?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Forget the stored credentials.
    pub async fn disconnect<S>(&self, store: &S) -> Result<()>
    where
        S: CredentialStore + ?Sized,
    {
        store.clear().await?;
        info!("signed out");
        Ok(())
    }
}
