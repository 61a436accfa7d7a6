//! local-tts: offline text-to-speech with voice cloning.
//!
//! The crate provides a generation server (`local-tts-server`) that owns a
//! single speech model and a registry of cloned voices, and a CLI client
//! (`local-tts`) that asks the server for speech and caches the audio locally.

pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod voice;
