use std::fmt;

use crate::{Error, Result};

/// Environment variable holding the application's consumer key.
pub const CONSUMER_KEY_ENV: &str = "X_CONSUMER_KEY";
/// Environment variable holding the application's consumer secret.
pub const CONSUMER_SECRET_ENV: &str = "X_CONSUMER_SECRET";

/// Supplies the key material a request is signed with.
///
/// The signing key is always `consumer_secret&token_secret`, with the token
/// part left empty when no token pair is available yet.
pub trait SecretsProvider {
    fn get_consumer_key_pair(&self) -> (&str, &str);

    fn get_token_pair_option(&self) -> Option<(&str, &str)>;

    fn get_token_option_pair(&self) -> (Option<&str>, Option<&str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or((None, None))
    }
}

/// Static identity of the application.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsumerCredentials {
    consumer_key: String,
    consumer_secret: String,
}

impl ConsumerCredentials {
    pub fn new<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        ConsumerCredentials {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Read the consumer pair from `X_CONSUMER_KEY` / `X_CONSUMER_SECRET`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(CONSUMER_KEY_ENV).map_err(|_| Error::Config(CONSUMER_KEY_ENV))?;
        let secret =
            std::env::var(CONSUMER_SECRET_ENV).map_err(|_| Error::Config(CONSUMER_SECRET_ENV))?;
        Ok(ConsumerCredentials::new(key, secret))
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Attach a user's access token pair.
    pub fn token<TKey, TSecret>(&self, token: TKey, token_secret: TSecret) -> AccessCredentials
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        AccessCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            access_token: token.into(),
            access_token_secret: token_secret.into(),
        }
    }

    pub(crate) fn with_request_token<'a>(
        &'a self,
        pair: &'a RequestTokenPair,
    ) -> RequestTokenSecrets<'a> {
        RequestTokenSecrets {
            consumer: self,
            pair,
        }
    }
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

impl SecretsProvider for ConsumerCredentials {
    fn get_consumer_key_pair(&self) -> (&str, &str) {
        (&self.consumer_key, &self.consumer_secret)
    }

    fn get_token_pair_option(&self) -> Option<(&str, &str)> {
        None
    }
}

/// Temporary credentials from the first leg of the handshake.
///
/// Not `Clone`: the access-token exchange takes it by value.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestTokenPair {
    pub token: String,
    pub token_secret: String,
}

#[derive(Debug, Clone)]
pub(crate) struct RequestTokenSecrets<'a> {
    consumer: &'a ConsumerCredentials,
    pair: &'a RequestTokenPair,
}

impl SecretsProvider for RequestTokenSecrets<'_> {
    fn get_consumer_key_pair(&self) -> (&str, &str) {
        self.consumer.get_consumer_key_pair()
    }

    fn get_token_pair_option(&self) -> Option<(&str, &str)> {
        Some((&self.pair.token, &self.pair.token_secret))
    }
}

/// Long-lived per-user credentials. Read-only once issued, so a single value
/// may sign any number of concurrent requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredentials {
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_token_secret: String,
}

impl AccessCredentials {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn access_token_secret(&self) -> &str {
        &self.access_token_secret
    }
}

impl fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

impl SecretsProvider for AccessCredentials {
    fn get_consumer_key_pair(&self) -> (&str, &str) {
        (&self.consumer_key, &self.consumer_secret)
    }

    fn get_token_pair_option(&self) -> Option<(&str, &str)> {
        Some((&self.access_token, &self.access_token_secret))
    }
}
