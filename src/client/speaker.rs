//! Client-side generation flow.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::{Backend, BackendError, CloneResponse, SynthesizeRequest, VoiceInfo};
use crate::storage;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Local TTS server is not running at {0}")]
    ServerUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Could not write audio: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives the generation server and stores results in a local cache directory.
pub struct Speaker<B: Backend> {
    backend: B,
    server: String,
    cache_dir: PathBuf,
}

impl<B: Backend> Speaker<B> {
    /// Create a new speaker. `server` is only used in diagnostics.
    pub fn new(backend: B, server: impl Into<String>, cache_dir: PathBuf) -> Self {
        Self {
            backend,
            server: server.into(),
            cache_dir,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether the server is reachable and its model is loaded.
    pub fn check_health(&self) -> bool {
        match self.backend.health() {
            Ok(health) => health.ready,
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Generate speech for `text` and return the path of the cached WAV file.
    ///
    /// Nothing is written unless the server returns audio.
    pub fn generate(&self, text: &str, voice_id: Option<String>) -> Result<PathBuf, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::InvalidInput("text cannot be empty".to_string()));
        }

        if !self.check_health() {
            return Err(ClientError::ServerUnavailable(self.server.clone()));
        }

        let mut request = SynthesizeRequest::new(text);
        if let Some(id) = voice_id.filter(|id| !id.is_empty()) {
            request = request.with_voice(id);
        }

        let audio = self.backend.synthesize(&request)?;
        self.store(&audio)
    }

    /// Write `audio` to a new timestamp-named file in the cache directory.
    fn store(&self, audio: &[u8]) -> Result<PathBuf, ClientError> {
        Ok(storage::write_timestamped(&self.cache_dir, "tts", audio)?)
    }

    /// List the voices registered on the server.
    pub fn list_voices(&self) -> Result<Vec<VoiceInfo>, ClientError> {
        Ok(self.backend.list_voices()?.voices)
    }

    /// Register `audio_path` as a new voice on the server.
    pub fn clone_voice(
        &self,
        audio_path: &Path,
        name: Option<String>,
    ) -> Result<CloneResponse, ClientError> {
        if !audio_path.is_file() {
            return Err(ClientError::AudioNotFound(audio_path.display().to_string()));
        }

        Ok(self.backend.clone_voice(audio_path, name)?)
    }
}
