use std::{collections::HashMap, future::Future};

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Response;
use serde::Deserialize;

use crate::{
    Error, ExchangeError, ExchangeResult, Result, OAUTH_TOKEN_KEY, OAUTH_TOKEN_SECRET_KEY,
};

/// Represents response of token acquisition.
#[derive(Deserialize, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    #[serde(default)]
    pub oauth_token_secret: String,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

/// Add parse_oauth_token feature to reqwest::Response.
// this trait is sealed
#[async_trait]
pub trait TokenReader: private::Sealed {
    async fn parse_oauth_token(self) -> Result<TokenResponse>;
}

#[async_trait]
impl TokenReader for Response {
    async fn parse_oauth_token(self) -> Result<TokenResponse> {
        let status = self.status();
        let text = self.text().await?;
        Ok(read_oauth_token(status, text)?)
    }
}

/// Add parse_oauth_token feature to Future of reqwest::Response.
// this trait is also sealed
#[async_trait]
pub trait TokenReaderFuture: private::SealedWrapper {
    async fn parse_oauth_token(self) -> Result<TokenResponse>;
}

#[async_trait]
impl<T, E> TokenReaderFuture for T
where
    T: Future<Output = std::result::Result<Response, E>> + Send,
    E: Into<Error> + Send + 'static,
{
    async fn parse_oauth_token(self) -> Result<TokenResponse> {
        match self.await {
            Ok(resp) => Ok(resp.parse_oauth_token().await?),
            Err(err) => Err(err.into()),
        }
    }
}

/// Read a form-encoded token response.
///
/// Only a 2xx answer carrying a non-empty `oauth_token` is accepted; a
/// missing `oauth_token_secret` reads as empty.
pub(crate) fn read_oauth_token(status: StatusCode, text: String) -> ExchangeResult<TokenResponse> {
    if !status.is_success() {
        return Err(ExchangeError::Status { status, body: text });
    }
    let mut destructured = url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured
        .remove(OAUTH_TOKEN_KEY)
        .filter(|token| !token.is_empty());
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match oauth_token {
        Some(t) => Ok(TokenResponse {
            oauth_token: t,
            oauth_token_secret: oauth_token_secret.unwrap_or_default(),
            remain: destructured,
        }),
        None => Err(ExchangeError::TokenKeyNotFound {
            key: OAUTH_TOKEN_KEY,
            status,
            body: text,
        }),
    }
}

mod private {
    use std::future::Future;

    use reqwest::Response;

    use crate::Error;

    pub trait Sealed {}
    impl Sealed for Response {}
    pub trait SealedWrapper {}
    impl<T, E> SealedWrapper for T
    where
        T: Future<Output = Result<Response, E>>,
        E: Into<Error>,
    {
    }
}
