//! Command-line arguments for the client and the server.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_PORT, DEFAULT_SERVER_URL};
use crate::runtime::Device;

/// Speak text through the local TTS server.
#[derive(Parser, Debug)]
#[command(name = "local-tts")]
#[command(about = "Generate speech with a local TTS server and print the audio path")]
#[command(version)]
pub struct Args {
    /// Text to speak
    pub text: Option<String>,

    /// Voice id to condition on (see --list)
    #[arg(short, long)]
    pub voice: Option<String>,

    /// List voices registered on the server
    #[arg(short, long)]
    pub list: bool,

    /// Report whether the server is online
    #[arg(short, long)]
    pub status: bool,

    /// Register a reference recording as a new voice
    #[arg(long, value_name = "FILE")]
    pub clone: Option<PathBuf>,

    /// Display name for --clone
    #[arg(short, long, requires = "clone")]
    pub name: Option<String>,

    /// Server base URL
    #[arg(long, env = "LOCAL_TTS_SERVER", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Directory generated audio is written to [default: ~/.clawdbot/media/tts]
    #[arg(long, env = "LOCAL_TTS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Serve text-to-speech and voice cloning over HTTP.
#[derive(Parser, Debug)]
#[command(name = "local-tts-server")]
#[command(about = "Offline text-to-speech server with voice cloning")]
#[command(version)]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Model directory (model.onnx, tokenizer.json) [default: ~/qwen3-tts/model]
    #[arg(long, env = "LOCAL_TTS_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Data directory holding voices/ and output/ [default: ~/qwen3-tts]
    #[arg(long, env = "LOCAL_TTS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Compute device; the first available of cuda, coreml, cpu when omitted
    #[arg(short, long, value_enum)]
    pub device: Option<Device>,
}
