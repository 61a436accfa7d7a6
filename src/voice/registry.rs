//! On-disk registry of voice-cloning reference profiles.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// File name of the reference recording inside a profile directory.
pub const REFERENCE_FILE: &str = "reference.wav";

/// File name of the metadata record inside a profile directory.
pub const METADATA_FILE: &str = "meta.json";

const STAGING_PREFIX: &str = ".staging-";
const ID_LEN: usize = 8;
const MAX_ID_ATTEMPTS: usize = 16;

/// Errors that can occur during voice registry operations.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice not found: {0}")]
    NotFound(String),

    #[error("Invalid reference audio: {0}")]
    InvalidAudio(String),

    #[error("Could not allocate a unique voice id")]
    IdExhausted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A stored reference recording plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceProfile {
    #[serde(rename = "voice_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "audio")]
    pub reference_audio_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Manages voice profiles under a single directory, one sub-directory per id.
#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    voices_dir: PathBuf,
}

impl VoiceRegistry {
    /// Create a registry rooted at `voices_dir`. The directory is created lazily.
    pub fn new(voices_dir: PathBuf) -> Self {
        Self { voices_dir }
    }

    /// Get the voices directory path.
    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    /// Default name for a profile registered without one.
    pub fn default_name() -> String {
        format!("voice_{}", Utc::now().timestamp())
    }

    /// Ids are single plain path components; anything else can never resolve.
    fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && !id.starts_with('.')
            && !id.contains('/')
            && !id.contains('\\')
            && !id.contains("..")
    }

    fn new_id() -> String {
        Uuid::new_v4().simple().to_string()[..ID_LEN].to_string()
    }

    /// Store a new reference recording and return its profile.
    ///
    /// The audio and metadata are written into a private staging directory that
    /// is renamed into place in one step, so a profile is either fully present
    /// under its id or not at all.
    pub fn register(&self, name: Option<String>, audio: &[u8]) -> Result<VoiceProfile, VoiceError> {
        if audio.is_empty() {
            return Err(VoiceError::InvalidAudio("audio payload is empty".to_string()));
        }

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(Self::default_name);

        std::fs::create_dir_all(&self.voices_dir)?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = Self::new_id();
            let final_dir = self.voices_dir.join(&id);
            if final_dir.exists() {
                continue;
            }

            let staging_dir = self.voices_dir.join(format!("{STAGING_PREFIX}{id}"));
            match std::fs::create_dir(&staging_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }

            let profile = VoiceProfile {
                id: id.clone(),
                name: name.clone(),
                reference_audio_path: final_dir.join(REFERENCE_FILE),
                created_at: Some(Utc::now().to_rfc3339()),
            };

            if let Err(e) = Self::write_profile(&staging_dir, &profile, audio) {
                let _ = std::fs::remove_dir_all(&staging_dir);
                return Err(e);
            }

            // rename fails if another writer published the same id first
            match std::fs::rename(&staging_dir, &final_dir) {
                Ok(()) => {
                    tracing::info!(voice_id = %id, name = %profile.name, "Registered voice profile");
                    return Ok(profile);
                }
                Err(e) => {
                    let _ = std::fs::remove_dir_all(&staging_dir);
                    if final_dir.exists() {
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(VoiceError::IdExhausted)
    }

    fn write_profile(dir: &Path, profile: &VoiceProfile, audio: &[u8]) -> Result<(), VoiceError> {
        std::fs::write(dir.join(REFERENCE_FILE), audio)?;
        let json = serde_json::to_string_pretty(profile)?;
        std::fs::write(dir.join(METADATA_FILE), json)?;
        Ok(())
    }

    /// Load one profile's metadata.
    pub fn get(&self, id: &str) -> Result<VoiceProfile, VoiceError> {
        if !Self::is_valid_id(id) {
            return Err(VoiceError::NotFound(id.to_string()));
        }

        let path = self.voices_dir.join(id).join(METADATA_FILE);
        if !path.exists() {
            return Err(VoiceError::NotFound(id.to_string()));
        }

        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Resolve a voice id to its reference recording.
    pub fn resolve(&self, id: &str) -> Result<PathBuf, VoiceError> {
        if !Self::is_valid_id(id) {
            return Err(VoiceError::NotFound(id.to_string()));
        }

        let path = self.voices_dir.join(id).join(REFERENCE_FILE);
        if path.is_file() {
            Ok(path)
        } else {
            Err(VoiceError::NotFound(id.to_string()))
        }
    }

    /// List every profile with a readable metadata record.
    ///
    /// Listing is best-effort: unreadable or corrupt entries are skipped.
    pub fn list(&self) -> Result<Vec<VoiceProfile>, VoiceError> {
        if !self.voices_dir.exists() {
            return Ok(Vec::new());
        }

        let mut voices = Vec::new();

        for entry in std::fs::read_dir(&self.voices_dir)?.flatten() {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !path.is_dir() {
                continue;
            }

            let Ok(json) = std::fs::read_to_string(path.join(METADATA_FILE)) else {
                continue;
            };
            match serde_json::from_str::<VoiceProfile>(&json) {
                Ok(profile) => voices.push(profile),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping corrupt voice record"),
            }
        }

        voices.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(voices)
    }
}
