use http::StatusCode;
use thiserror::Error;

use crate::pipeline::Stage;

pub type Result<T> = std::result::Result<T, Error>;
pub type SignResult<T> = std::result::Result<T, SignError>;
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// Error type produced by the collaborators (image fetch, composition).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("token exchange failed : {0}")]
    Exchange(#[from] ExchangeError),
    #[error("invalid callback : {0}")]
    Callback(#[from] CallbackError),
    #[error("{context} failed ({status}): {body}")]
    AuthRequest {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{stage} failed : {message}")]
    PipelineStep { stage: Stage, message: String },
    #[error("pipeline is not idle (currently {0})")]
    PipelineBusy(&'static str),
    #[error("pipeline was reset while the run was in flight")]
    Superseded,
    /// Raised by [`CredentialStore`](crate::CredentialStore) implementations.
    #[error("credential store failed : {0}")]
    Store(String),
    #[error("missing configuration : {0}")]
    Config(&'static str),
    #[error("malformed response : {0}")]
    Json(#[from] serde_json::Error),
    #[error("request failed : {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// `true` when the provider rejected the signed credentials (401/403).
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::AuthRequest { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("duplicate signature parameter : {0}")]
    DuplicateParameter(String),
    #[error("invalid base url {0}, must be absolute and carry no query string.")]
    InvalidUrl(String),
    #[error("HMAC-SHA1 rejected the signing key.")]
    InvalidKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("provider answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("response has malformed format: not found {key} in {body} ({status})")]
    TokenKeyNotFound {
        key: &'static str,
        status: StatusCode,
        body: String,
    },
}

impl ExchangeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExchangeError::Status { status, .. } => *status,
            ExchangeError::TokenKeyNotFound { status, .. } => *status,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            ExchangeError::Status { body, .. } => body,
            ExchangeError::TokenKeyNotFound { body, .. } => body,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("returned oauth_token {received:?} does not match the requested token")]
    TokenMismatch { received: Option<String> },
    #[error("oauth_verifier is missing")]
    MissingVerifier,
    #[error("redirect url could not be parsed : {0}")]
    MalformedUrl(String),
}
