/*!
banner-oauth1: sign in with X over OAuth 1.0a and update the profile banner.

# Overview

This library signs [reqwest](https://crates.io/crates/reqwest) requests with
OAuth 1.0a HMAC-SHA1, runs the three-legged handshake to obtain user
credentials, and drives a download → compose → upload pipeline that
replaces the signed-in user's profile banner.

# How to use

## Basic usecase 1 - signing any request

```ignore
use banner_oauth1::{ConsumerCredentials, OAuthClientProvider};

let secrets = ConsumerCredentials::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]")
    .token("[ACCESS_TOKEN]", "[TOKEN_SECRET]");

let resp = reqwest::Client::new()
    // enable OAuth1 request
    .oauth1(&secrets)
    .post("https://api.twitter.com/1.1/statuses/update.json")
    .form(&[("status", "Hello, X!")])
    .send()
    .await?;
```

## Basic usecase 2 - acquiring access credentials

```ignore
use banner_oauth1::{Callback, ConsumerCredentials, Endpoints, OAuthFlow};

let flow = OAuthFlow::new(ConsumerCredentials::from_env()?, Endpoints::default());

// step 1: temporary credentials
let pair = flow.request_token("app://callback").await?;

// step 2: send the user to the authorize page, capture the redirect
println!("please access to: {}", flow.authorization_url(&pair));
let redirect = wait_for_redirect().await;

// step 3: trade the verifier for access credentials
let grant = flow
    .exchange_verifier(pair, &Callback::parse(&redirect)?)
    .await?;
println!("signed in as {}", grant.screen_name);
```

## Basic usecase 3 - updating the banner

```ignore
use banner_oauth1::{BannerSource, HttpImageFetcher, OverlayConfig, UploadPipeline};

let pipeline = UploadPipeline::new(HttpImageFetcher::default(), composer, connector.api().clone());
let source = BannerSource {
    remote_url: session.banner_url().map(str::to_string),
    fallback: "assets/banner.jpg".to_string(),
};
let uploaded = pipeline.run(&session, &source, &OverlayConfig::default()).await?;
```
*/
mod api;
mod client;
mod config;
pub mod encode;
mod error;
mod handshake;
mod overlay;
mod pipeline;
mod request;
mod secrets;
mod session;
mod signer;
mod token_reader;

// exposed to external program
pub use api::{BannerApi, BannerUploader, Identity};
pub use client::{Client, OAuthClientProvider};
pub use config::{Endpoints, API_BASE_URL, OAUTH_BASE_URL};
pub use error::{
    BoxError, CallbackError, Error, ExchangeError, ExchangeResult, Result, SignError, SignResult,
};
pub use handshake::{AccessGrant, Callback, OAuthFlow};
pub use overlay::{
    full_size_banner_url, ComposedImage, HttpImageFetcher, ImageComposer, ImageFetcher,
    ImagePosition, ImageVariant, OverlayConfig, SourceImage, BANNER_HEIGHT, BANNER_WIDTH,
};
pub use pipeline::{BannerSource, PipelineState, Stage, UploadPipeline};
pub use request::RequestBuilder;
pub use secrets::{
    AccessCredentials, ConsumerCredentials, RequestTokenPair, SecretsProvider, CONSUMER_KEY_ENV,
    CONSUMER_SECRET_ENV,
};
pub use session::{
    AuthorizationBrowser, Connector, CredentialStore, MemoryCredentialStore, Session,
    StoredCredentials,
};
pub use signer::{
    authorization_header, sign, signature_base_string, signed_authorization, signing_key,
    OAuthParameters, SignatureParams, Signer, HMAC_SHA1, OAUTH_VERSION,
};
pub use token_reader::{TokenReader, TokenReaderFuture, TokenResponse};

// exposed constant variables
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";

// crate-private constant variables
pub(crate) const OAUTH_SIGNATURE_METHOD_KEY: &str = "oauth_signature_method";
pub(crate) const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
pub(crate) const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub(crate) const OAUTH_TOKEN_KEY: &str = "oauth_token";
pub(crate) const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";
