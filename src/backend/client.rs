//! Blocking HTTP client for the generation server.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{RequestBuilder, Response};

use super::Backend;
use super::types::{
    BackendError, CloneResponse, HealthResponse, SynthesizeRequest, VoicesResponse,
};

/// Liveness checks must answer quickly.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
pub const LIST_TIMEOUT: Duration = Duration::from_secs(5);
pub const CLONE_TIMEOUT: Duration = Duration::from_secs(30);
/// Synthesis is accelerator-bound and may take tens of seconds.
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP-based backend client.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend client for `base_url` (e.g. `http://localhost:5123`).
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Response, BackendError> {
        let response = request.timeout(timeout).send().map_err(|e| {
            if e.is_timeout() {
                BackendError::ConnectionFailed(format!(
                    "timed out after {}s ({e})",
                    timeout.as_secs()
                ))
            } else {
                BackendError::ConnectionFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }

        Ok(response)
    }
}

impl Backend for HttpBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        let response = self.send(self.client.get(self.url("/health")), HEALTH_TIMEOUT)?;

        response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn clone_voice(
        &self,
        audio_path: &Path,
        name: Option<String>,
    ) -> Result<CloneResponse, BackendError> {
        let audio_data = std::fs::read(audio_path)
            .map_err(|_| BackendError::FileNotFound(audio_path.display().to_string()))?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("reference.wav");

        let file_part = reqwest::blocking::multipart::Part::bytes(audio_data)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let mut form = reqwest::blocking::multipart::Form::new().part("audio", file_part);

        if let Some(n) = name {
            form = form.text("name", n);
        }

        let response = self.send(
            self.client.post(self.url("/v1/clone")).multipart(form),
            CLONE_TIMEOUT,
        )?;

        response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError> {
        let response = self.send(
            self.client.post(self.url("/v1/tts")).json(request),
            GENERATE_TIMEOUT,
        )?;

        let audio = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if audio.is_empty() {
            return Err(BackendError::InvalidResponse("empty audio body".to_string()));
        }

        Ok(audio)
    }

    fn list_voices(&self) -> Result<VoicesResponse, BackendError> {
        let response = self.send(self.client.get(self.url("/v1/voices")), LIST_TIMEOUT)?;

        response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
