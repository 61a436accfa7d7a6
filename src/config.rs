//! Default locations and resolved server configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::cli::ServerArgs;
use crate::runtime::Device;

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5123;

/// Server URL the client talks to unless told otherwise.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5123";

const DATA_DIR_NAME: &str = "qwen3-tts";
const MODEL_DIR_NAME: &str = "model";
const VOICES_DIR_NAME: &str = "voices";
const OUTPUT_DIR_NAME: &str = "output";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Default server data directory: `~/qwen3-tts`.
pub fn default_data_dir() -> PathBuf {
    home_dir().join(DATA_DIR_NAME)
}

/// Default model directory: `~/qwen3-tts/model`.
pub fn default_model_dir() -> PathBuf {
    default_data_dir().join(MODEL_DIR_NAME)
}

/// Default client cache directory: `~/.clawdbot/media/tts`.
pub fn default_cache_dir() -> PathBuf {
    home_dir().join(".clawdbot").join("media").join("tts")
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub model_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub output_dir: PathBuf,
    pub device: Option<Device>,
}

impl ServerConfig {
    pub fn new(host: IpAddr, port: u16, model_dir: PathBuf, data_dir: &Path) -> Self {
        Self {
            addr: SocketAddr::new(host, port),
            model_dir,
            voices_dir: data_dir.join(VOICES_DIR_NAME),
            output_dir: data_dir.join(OUTPUT_DIR_NAME),
            device: None,
        }
    }

    pub fn from_args(args: &ServerArgs) -> Self {
        let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
        let model_dir = args.model_dir.clone().unwrap_or_else(default_model_dir);

        Self {
            device: args.device,
            ..Self::new(args.host, args.port, model_dir, &data_dir)
        }
    }

    /// Create the voices and output directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.voices_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}
