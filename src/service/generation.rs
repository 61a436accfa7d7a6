//! Transport-independent generation operations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{CloneResponse, HealthResponse, SynthesizeRequest, VoiceInfo, VoicesResponse};
use crate::runtime::{ModelRuntime, SAMPLE_RATE, audio};
use crate::storage;
use crate::voice::VoiceRegistry;

use super::ServiceError;

/// Audio produced by a successful synthesis.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// 24 kHz mono 16-bit WAV bytes.
    pub wav: Vec<u8>,
    /// Where the WAV was persisted.
    pub path: PathBuf,
    pub duration_secs: f32,
}

/// Validates requests and coordinates the voice registry and model runtime.
pub struct GenerationService {
    runtime: Arc<ModelRuntime>,
    registry: VoiceRegistry,
    output_dir: PathBuf,
}

impl GenerationService {
    pub fn new(runtime: Arc<ModelRuntime>, registry: VoiceRegistry, output_dir: PathBuf) -> Self {
        Self {
            runtime,
            registry,
            output_dir,
        }
    }

    pub fn runtime(&self) -> &ModelRuntime {
        &self.runtime
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    /// Report readiness of the model runtime.
    pub fn health(&self) -> HealthResponse {
        let ready = self.runtime.is_ready();
        HealthResponse {
            status: if ready { "ok" } else { "loading" }.to_string(),
            ready,
            model: self.runtime.model_name().map(str::to_string),
            device: self.runtime.device().map(|d| d.to_string()),
        }
    }

    /// Register a reference recording as a new voice.
    pub fn clone_voice(
        &self,
        name: Option<String>,
        audio: Option<&[u8]>,
    ) -> Result<CloneResponse, ServiceError> {
        let audio = match audio {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(ServiceError::InvalidInput("No audio file".to_string())),
        };

        let profile = self.registry.register(name, audio)?;
        Ok(CloneResponse {
            voice_id: profile.id,
            name: profile.name,
        })
    }

    /// Synthesize speech, persist it to the output directory and return it.
    ///
    /// An unknown `voice_id` falls back to the default voice.
    pub fn synthesize(&self, request: &SynthesizeRequest) -> Result<Synthesis, ServiceError> {
        if request.text.trim().is_empty() {
            return Err(ServiceError::InvalidInput("No text provided".to_string()));
        }

        let voice_id = request.voice_id.as_deref().filter(|id| !id.is_empty());
        let reference = voice_id.and_then(|id| match self.registry.resolve(id) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(voice_id = id, error = %e, "Voice not resolved, using default voice");
                None
            }
        });

        let started = Instant::now();
        let samples = self
            .runtime
            .synthesize(&request.text, reference.as_deref())
            .inspect_err(|e| tracing::error!(error = %e, "Synthesis failed"))?;

        let wav = audio::encode_wav(&samples, SAMPLE_RATE)
            .map_err(|e| ServiceError::RuntimeFailure(format!("failed to encode audio: {e}")))?;
        let path = storage::write_timestamped(&self.output_dir, "memo", &wav)
            .map_err(|e| ServiceError::RuntimeFailure(format!("failed to save audio: {e}")))?;

        let duration_secs = audio::duration_secs(samples.len(), SAMPLE_RATE);
        tracing::info!(
            chars = request.text.chars().count(),
            conditioned = reference.is_some(),
            duration_secs,
            elapsed_ms = started.elapsed().as_millis() as u64,
            path = %path.display(),
            "Generated speech"
        );

        Ok(Synthesis {
            wav,
            path,
            duration_secs,
        })
    }

    /// List registered voices. Never fails: registry errors yield an empty list.
    pub fn list_voices(&self) -> VoicesResponse {
        let profiles = self.registry.list().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not list voices");
            Vec::new()
        });

        VoicesResponse {
            voices: profiles
                .into_iter()
                .map(|p| VoiceInfo {
                    voice_id: p.id,
                    name: p.name,
                    created_at: p.created_at,
                })
                .collect(),
        }
    }
}
