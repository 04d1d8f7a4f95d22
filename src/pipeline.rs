use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::BannerUploader;
use crate::overlay::{ComposedImage, ImageComposer, ImageFetcher, OverlayConfig};
use crate::session::Session;
use crate::{Error, Result};

/// The step of a run an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Compose,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Download => "download",
            Stage::Compose => "compose",
            Stage::Upload => "upload",
        })
    }
}

/// Where a banner update currently stands.
///
/// Outputs live inside the variants that produce them, so an uploaded
/// reference can only exist in `Done` and a message only in `Error`.
/// `composed_ref` is `None` for a direct upload, which skips composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Downloading,
    Composing,
    Uploading {
        composed_ref: Option<String>,
    },
    Done {
        composed_ref: Option<String>,
        uploaded_ref: String,
    },
    Error {
        stage: Stage,
        message: String,
        composed_ref: Option<String>,
    },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Downloading => "downloading",
            PipelineState::Composing => "composing",
            PipelineState::Uploading { .. } => "uploading",
            PipelineState::Done { .. } => "done",
            PipelineState::Error { .. } => "error",
        }
    }

    /// Progress text for the user; empty when there is nothing to say.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle | PipelineState::Error { .. } => "",
            PipelineState::Downloading => "Downloading your banner...",
            PipelineState::Composing => "Generating overlay...",
            PipelineState::Uploading { .. } => "Uploading to X...",
            PipelineState::Done { .. } => "Banner updated!",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done { .. } | PipelineState::Error { .. })
    }

    pub fn composed_ref(&self) -> Option<&str> {
        match self {
            PipelineState::Uploading { composed_ref }
            | PipelineState::Done { composed_ref, .. }
            | PipelineState::Error { composed_ref, .. } => composed_ref.as_deref(),
            _ => None,
        }
    }

    pub fn uploaded_ref(&self) -> Option<&str> {
        match self {
            PipelineState::Done { uploaded_ref, .. } => Some(uploaded_ref),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PipelineState::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Where the source banner comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerSource {
    /// The user's current banner, downloaded when present.
    pub remote_url: Option<String>,
    /// Local banner used otherwise.
    pub fallback: String,
}

/// Download, compose and upload, strictly in that order.
///
/// One run at a time: `run` and `upload_only` refuse to start unless the
/// pipeline is idle, and a finished run stays visible until `reset`.
pub struct UploadPipeline<F, C, U> {
    fetcher: F,
    composer: C,
    uploader: U,
    state: watch::Sender<PipelineState>,
    // bumped by reset; runs from an older generation can no longer write
    generation: AtomicU64,
}

impl<F, C, U> UploadPipeline<F, C, U>
where
    F: ImageFetcher,
    C: ImageComposer,
    U: BannerUploader,
{
    pub fn new(fetcher: F, composer: C, uploader: U) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        UploadPipeline {
            fetcher,
            composer,
            uploader,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Follow state changes, e.g. to render progress.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Back to `Idle` with every output cleared.
    ///
    /// Safe at any time: a run still in flight finishes with
    /// [`Error::Superseded`] and leaves the state untouched.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = PipelineState::Idle;
        });
        debug!("pipeline reset");
    }

    /// Update the session user's banner. Returns the uploaded reference.
    pub async fn run(
        &self,
        session: &Session,
        source: &BannerSource,
        overlay: &OverlayConfig,
    ) -> Result<String> {
        let run = self.begin(PipelineState::Downloading)?;
        info!(run, screen_name = session.screen_name(), "banner update started");

        let fetched = match source.remote_url {
            Some(ref url) => self.fetcher.fetch(url).await,
            None => self.fetcher.resolve_fallback(&source.fallback).await,
        };
        let source_image = self.settle(run, Stage::Download, None, fetched)?;
        self.advance(run, PipelineState::Composing)?;

        let composed = self.composer.compose(&source_image, overlay).await;
        let composed = self.settle(run, Stage::Compose, None, composed)?;
        self.advance(
            run,
            PipelineState::Uploading {
                composed_ref: Some(composed.reference.clone()),
            },
        )?;

        let uploaded = self
            .uploader
            .upload_banner(session.credentials(), &composed)
            .await;
        self.settle(run, Stage::Upload, Some(&composed.reference), uploaded)?;
        self.advance(
            run,
            PipelineState::Done {
                composed_ref: Some(composed.reference.clone()),
                uploaded_ref: composed.reference.clone(),
            },
        )?;

        info!(run, "banner update done");
        Ok(composed.reference)
    }

    /// Upload the local banner `asset` as is, without an overlay.
    ///
    /// Goes straight from `Idle` to `Uploading`; failing to load the asset
    /// counts as an upload failure. Returns the asset reference.
    pub async fn upload_only(&self, session: &Session, asset: &str) -> Result<String> {
        let run = self.begin(PipelineState::Uploading { composed_ref: None })?;
        info!(run, screen_name = session.screen_name(), %asset, "direct banner upload started");

        let resolved = self.fetcher.resolve_fallback(asset).await;
        let image = self.settle(run, Stage::Upload, None, resolved)?;
        let image = ComposedImage::banner(image.reference, image.bytes);

        let uploaded = self
            .uploader
            .upload_banner(session.credentials(), &image)
            .await;
        self.settle(run, Stage::Upload, None, uploaded)?;
        self.advance(
            run,
            PipelineState::Done {
                composed_ref: None,
                uploaded_ref: image.reference.clone(),
            },
        )?;

        info!(run, "direct banner upload done");
        Ok(image.reference)
    }

    fn begin(&self, first: PipelineState) -> Result<u64> {
        let mut outcome = Err(Error::Superseded);
        self.state.send_if_modified(|state| {
            if *state != PipelineState::Idle {
                outcome = Err(Error::PipelineBusy(state.name()));
                return false;
            }
            *state = first;
            outcome = Ok(self.generation.load(Ordering::SeqCst));
            true
        });
        outcome
    }

    /// Move to `next` unless the run has been reset meanwhile.
    fn transition(&self, run: u64, next: PipelineState) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != run {
                return false;
            }
            debug!(run, from = state.name(), to = next.name(), "pipeline transition");
            *state = next;
            true
        })
    }

    fn advance(&self, run: u64, next: PipelineState) -> Result<()> {
        if self.transition(run, next) {
            Ok(())
        } else {
            Err(Error::Superseded)
        }
    }

    fn settle<T, E>(
        &self,
        run: u64,
        stage: Stage,
        composed_ref: Option<&str>,
        outcome: std::result::Result<T, E>,
    ) -> Result<T>
    where
        E: fmt::Display,
    {
        outcome.map_err(|err| {
            let mut message = err.to_string();
            if message.trim().is_empty() {
                message = format!("{} failed", stage);
            }
            let failed = PipelineState::Error {
                stage,
                message: message.clone(),
                composed_ref: composed_ref.map(str::to_string),
            };
            if self.transition(run, failed) {
                warn!(run, %stage, %message, "banner update failed");
                Error::PipelineStep { stage, message }
            } else {
                debug!(run, %stage, %message, "superseded run failed after reset");
                Error::Superseded
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use async_trait::async_trait;
    use http::StatusCode;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::BoxError;
    use crate::overlay::SourceImage;
    use crate::{AccessCredentials, ConsumerCredentials};

    #[derive(Default)]
    struct FakeFetcher {
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<SourceImage, BoxError> {
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err("banner download failed (404)".into());
            }
            Ok(SourceImage {
                reference: url.to_string(),
                bytes: b"remote".to_vec(),
            })
        }

        async fn resolve_fallback(
            &self,
            reference: &str,
        ) -> std::result::Result<SourceImage, BoxError> {
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(format!("{} not found", reference).into());
            }
            Ok(SourceImage {
                reference: reference.to_string(),
                bytes: b"fallback".to_vec(),
            })
        }
    }

    #[derive(Default)]
    struct FakeComposer {
        calls: AtomicUsize,
        fail_silently: bool,
    }

    #[async_trait]
    impl ImageComposer for FakeComposer {
        async fn compose(
            &self,
            source: &SourceImage,
            config: &OverlayConfig,
        ) -> std::result::Result<ComposedImage, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_silently {
                return Err("".into());
            }
            let reference = format!(
                "composed-{}-{}",
                String::from_utf8_lossy(&source.bytes),
                config.image_variant.asset_name()
            );
            Ok(ComposedImage::banner(reference, vec![1, 2, 3]))
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        reject: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BannerUploader for FakeUploader {
        async fn upload_banner(
            &self,
            credentials: &AccessCredentials,
            image: &ComposedImage,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(credentials.access_token(), "T2");
            assert_eq!((image.width, image.height), (1500, 500));
            if self.reject {
                return Err(Error::AuthRequest {
                    context: "banner update",
                    status: StatusCode::FORBIDDEN,
                    body: "read-only application".to_string(),
                });
            }
            Ok(())
        }
    }

    fn session() -> Session {
        Session::new(
            ConsumerCredentials::new("C", "C-secret").token("T2", "S2"),
            "alice".to_string(),
            None,
        )
    }

    fn remote() -> BannerSource {
        BannerSource {
            remote_url: Some("https://pbs.twimg.com/profile_banners/7/1".to_string()),
            fallback: "assets/banner.jpg".to_string(),
        }
    }

    fn fallback() -> BannerSource {
        BannerSource {
            remote_url: None,
            fallback: "assets/banner.jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_run_reaches_done() {
        let pipeline = UploadPipeline::new(
            FakeFetcher::default(),
            FakeComposer::default(),
            FakeUploader::default(),
        );

        let uploaded = pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap();

        assert_eq!(uploaded, "composed-remote-phone_1");
        let state = pipeline.state();
        assert_eq!(state.name(), "done");
        assert_eq!(state.uploaded_ref(), Some("composed-remote-phone_1"));
        assert_eq!(state.composed_ref(), Some("composed-remote-phone_1"));
        assert_eq!(state.error_message(), None);
        assert_eq!(state.label(), "Banner updated!");
    }

    #[tokio::test]
    async fn missing_remote_uses_fallback() {
        let pipeline = UploadPipeline::new(
            FakeFetcher::default(),
            FakeComposer::default(),
            FakeUploader::default(),
        );

        let uploaded = pipeline
            .run(&session(), &fallback(), &OverlayConfig::default())
            .await
            .unwrap();

        assert_eq!(uploaded, "composed-fallback-phone_1");
    }

    #[tokio::test]
    async fn failed_download_never_composes() {
        let pipeline = UploadPipeline::new(
            FakeFetcher {
                fail: true,
                gate: None,
            },
            FakeComposer::default(),
            FakeUploader::default(),
        );

        let err = pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::PipelineStep {
                stage: Stage::Download,
                ..
            }
        ));
        let state = pipeline.state();
        assert_eq!(state.name(), "error");
        assert_eq!(state.error_message(), Some("banner download failed (404)"));
        assert_eq!(pipeline.composer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_error_still_gets_a_message() {
        let pipeline = UploadPipeline::new(
            FakeFetcher::default(),
            FakeComposer {
                fail_silently: true,
                ..Default::default()
            },
            FakeUploader::default(),
        );

        pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap_err();

        assert_eq!(pipeline.state().error_message(), Some("compose failed"));
        assert_eq!(pipeline.uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_upload_keeps_status_and_body() {
        let pipeline = UploadPipeline::new(
            FakeFetcher::default(),
            FakeComposer::default(),
            FakeUploader {
                reject: true,
                ..Default::default()
            },
        );

        pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap_err();

        let state = pipeline.state();
        let message = state.error_message().unwrap();
        assert!(message.contains("403"));
        assert!(message.contains("read-only application"));
        assert_eq!(state.composed_ref(), Some("composed-remote-phone_1"));
        assert_eq!(state.uploaded_ref(), None);
    }

    #[tokio::test]
    async fn reset_clears_outputs() {
        let pipeline = UploadPipeline::new(
            FakeFetcher {
                fail: true,
                gate: None,
            },
            FakeComposer::default(),
            FakeUploader::default(),
        );
        pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap_err();

        pipeline.reset();

        let state = pipeline.state();
        assert_eq!(state, PipelineState::Idle);
        assert_eq!(state.uploaded_ref(), None);
        assert_eq!(state.composed_ref(), None);
        assert_eq!(state.error_message(), None);
    }

    #[tokio::test]
    async fn finished_run_must_be_reset_before_restart() {
        let pipeline = UploadPipeline::new(
            FakeFetcher::default(),
            FakeComposer::default(),
            FakeUploader::default(),
        );
        pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap();

        let err = pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PipelineBusy("done")));

        pipeline.reset();
        pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_during_run_hides_the_stale_result() {
        let gate = Arc::new(Notify::new());
        let pipeline = UploadPipeline::new(
            FakeFetcher {
                fail: false,
                gate: Some(gate.clone()),
            },
            FakeComposer::default(),
            FakeUploader::default(),
        );
        let mut states = pipeline.subscribe();
        let (session, source, overlay) = (session(), remote(), OverlayConfig::default());

        let run = pipeline.run(&session, &source, &overlay);
        let interrupt = async {
            states
                .wait_for(|state| *state == PipelineState::Downloading)
                .await
                .unwrap();
            pipeline.reset();
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(run, interrupt);

        assert!(matches!(result, Err(Error::Superseded)));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.composer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_upload_skips_download_and_compose() {
        let gate = Arc::new(Notify::new());
        let pipeline = UploadPipeline::new(
            FakeFetcher {
                fail: false,
                gate: Some(gate.clone()),
            },
            FakeComposer::default(),
            FakeUploader::default(),
        );
        let mut states = pipeline.subscribe();
        let session = session();

        let upload = pipeline.upload_only(&session, "assets/banner.jpg");
        let observe = async {
            let first = states.wait_for(|state| *state != PipelineState::Idle).await.unwrap().clone();
            gate.notify_one();
            first
        };
        let (uploaded, first) = tokio::join!(upload, observe);

        assert_eq!(first, PipelineState::Uploading { composed_ref: None });
        assert_eq!(uploaded.unwrap(), "assets/banner.jpg");
        assert_eq!(
            pipeline.state(),
            PipelineState::Done {
                composed_ref: None,
                uploaded_ref: "assets/banner.jpg".to_string(),
            }
        );
        assert_eq!(pipeline.composer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.uploader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn direct_upload_with_missing_asset_fails_as_upload() {
        let pipeline = UploadPipeline::new(
            FakeFetcher {
                fail: true,
                gate: None,
            },
            FakeComposer::default(),
            FakeUploader::default(),
        );

        let err = pipeline
            .upload_only(&session(), "assets/missing.jpg")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::PipelineStep {
                stage: Stage::Upload,
                ..
            }
        ));
        let state = pipeline.state();
        assert_eq!(state.error_message(), Some("assets/missing.jpg not found"));
        assert_eq!(state.composed_ref(), None);
        assert_eq!(pipeline.uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_upload_refused_while_busy() {
        let pipeline = UploadPipeline::new(
            FakeFetcher::default(),
            FakeComposer::default(),
            FakeUploader::default(),
        );
        pipeline.upload_only(&session(), "assets/banner.jpg").await.unwrap();

        let err = pipeline
            .run(&session(), &remote(), &OverlayConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PipelineBusy("done")));
    }

    #[test]
    fn labels() {
        assert_eq!(PipelineState::Idle.label(), "");
        assert_eq!(PipelineState::Downloading.label(), "Downloading your banner...");
        assert_eq!(PipelineState::Composing.label(), "Generating overlay...");
        assert!(!PipelineState::Composing.is_terminal());
        assert!(PipelineState::Error {
            stage: Stage::Upload,
            message: "x".to_string(),
            composed_ref: None,
        }
        .is_terminal());
    }
}
