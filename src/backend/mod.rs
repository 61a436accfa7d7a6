//! Communication with the local generation server.
//!
//! Provides the [`Backend`] trait, its blocking HTTP implementation and the
//! wire types shared with the server side.

mod client;
mod types;

pub use client::{CLONE_TIMEOUT, GENERATE_TIMEOUT, HEALTH_TIMEOUT, HttpBackend, LIST_TIMEOUT};
pub use types::{
    BackendError, CloneResponse, ErrorResponse, HealthResponse, SynthesizeRequest, VoiceInfo,
    VoicesResponse,
};

/// Trait for generation server communication.
///
/// This trait abstracts the HTTP communication with the server,
/// allowing for mock implementations in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    /// Check server health and model readiness.
    fn health(&self) -> Result<HealthResponse, BackendError>;

    /// Register a reference recording as a new voice.
    ///
    /// # Arguments
    /// * `audio_path` - Path to the reference audio file
    /// * `name` - Optional human-readable name
    fn clone_voice(
        &self,
        audio_path: &std::path::Path,
        name: Option<String>,
    ) -> Result<CloneResponse, BackendError>;

    /// Synthesize speech from text.
    ///
    /// # Returns
    /// Raw WAV audio data
    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError>;

    /// List all registered voices.
    fn list_voices(&self) -> Result<VoicesResponse, BackendError>;
}

/// Create a backend for the server at `base_url`.
pub fn create_backend(base_url: &str) -> HttpBackend {
    HttpBackend::new(base_url)
}
