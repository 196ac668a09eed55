//! Contract with the remote text-to-speech service, plus the HTTP implementation.
//!
//! The pipeline core only depends on the [`TtsService`] trait; `synthd` wires in
//! [`HttpTtsService`], tests script their own implementation.

mod error;
mod http;
mod types;

pub use error::ApiError;
pub use http::HttpTtsService;
pub use types::{ClipSpec, ClipState};

use async_trait::async_trait;

/// Progress observer for a streamed download, called with a fraction in [0, 1].
pub type ProgressFn<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// The four operations the pipeline needs from the speech service.
///
/// Every call resolves exactly once, with a typed value or an [`ApiError`];
/// nothing about the transport leaks through this boundary.
#[async_trait]
pub trait TtsService: Send + Sync + 'static {
    /// Create a new clip (`clip_id = None`) or update an existing one.
    /// Returns the remote clip id.
    async fn create_or_update(
        &self,
        clip_id: Option<&str>,
        spec: &ClipSpec,
    ) -> Result<String, ApiError>;

    /// Ask whether the clip has finished rendering.
    async fn clip_state(&self, clip_id: &str) -> Result<ClipState, ApiError>;

    /// Fetch the rendered audio. `progress` is invoked as bytes arrive.
    async fn download(&self, url: &str, progress: ProgressFn<'_>) -> Result<Vec<u8>, ApiError>;

    /// Delete the remote clip.
    async fn delete_clip(&self, clip_id: &str) -> Result<(), ApiError>;
}
