use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BoxError;

pub const BANNER_WIDTH: u32 = 1500;
pub const BANNER_HEIGHT: u32 = 500;

const FULL_SIZE_SUFFIX: &str = "/1500x500";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageVariant {
    #[serde(rename = "phone_1")]
    Phone1,
    #[serde(rename = "phone_2")]
    Phone2,
}

impl ImageVariant {
    /// Name of the bundled overlay asset.
    pub fn asset_name(self) -> &'static str {
        match self {
            ImageVariant::Phone1 => "phone_1",
            ImageVariant::Phone2 => "phone_2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePosition {
    Left,
    Right,
}

/// What the composition collaborator draws on top of the source banner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayConfig {
    pub image_variant: ImageVariant,
    pub image_position: ImagePosition,
    pub primary_text: String,
    pub secondary_text: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            image_variant: ImageVariant::Phone1,
            image_position: ImagePosition::Right,
            primary_text: "Your Solana identity, powered by Echo".to_string(),
            secondary_text: "Generated on Echo, download on Solana Seeker dApp Store".to_string(),
        }
    }
}

/// Source banner bytes plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub reference: String,
    pub bytes: Vec<u8>,
}

/// Rendered banner, opaque to everything but the upload step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedImage {
    pub reference: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ComposedImage {
    /// A composite at the provider's banner size.
    pub fn banner<T: Into<String>>(reference: T, bytes: Vec<u8>) -> Self {
        ComposedImage {
            reference: reference.into(),
            bytes,
            width: BANNER_WIDTH,
            height: BANNER_HEIGHT,
        }
    }
}

/// Produces the source banner for a run.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download a remote banner.
    async fn fetch(&self, url: &str) -> Result<SourceImage, BoxError>;

    /// Load the bundled banner used when the user has none.
    async fn resolve_fallback(&self, reference: &str) -> Result<SourceImage, BoxError>;
}

/// Renders the overlay onto the source banner.
#[async_trait]
pub trait ImageComposer: Send + Sync {
    async fn compose(
        &self,
        source: &SourceImage,
        config: &OverlayConfig,
    ) -> Result<ComposedImage, BoxError>;
}

/// Profile banner URLs usually omit the size segment; ask for full size.
pub fn full_size_banner_url(url: &str) -> String {
    if url.contains(FULL_SIZE_SUFFIX) {
        url.to_string()
    } else {
        format!("{}{}", url.trim_end_matches('/'), FULL_SIZE_SUFFIX)
    }
}

/// Fetches remote banners over HTTP and fallbacks from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpImageFetcher { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<SourceImage, BoxError> {
        let url = full_size_banner_url(url);
        debug!(%url, "downloading banner");
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(SourceImage {
            reference: url,
            bytes: bytes.to_vec(),
        })
    }

    async fn resolve_fallback(&self, reference: &str) -> Result<SourceImage, BoxError> {
        debug!(%reference, "loading fallback banner");
        let bytes = tokio::fs::read(reference).await?;
        Ok(SourceImage {
            reference: reference.to_string(),
            bytes,
        })
    }
}
