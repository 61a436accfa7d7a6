//! local-tts CLI entry point.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use local_tts::backend::{Backend, BackendError, create_backend};
use local_tts::cli::Args;
use local_tts::client::{ClientError, Speaker};
use local_tts::{config, logging};

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(if args.verbose { "info" } else { "warn" });

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let cache_dir = args.cache_dir.clone().unwrap_or_else(config::default_cache_dir);
    let backend = create_backend(&args.server);
    let speaker = Speaker::new(backend, args.server.clone(), cache_dir);

    if args.status {
        let state = if speaker.check_health() { "online" } else { "offline" };
        println!("Local TTS server at {}: {state}", args.server);
        return Ok(ExitCode::SUCCESS);
    }

    if args.list {
        list_voices(&speaker)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(audio_path) = &args.clone {
        let voice = speaker
            .clone_voice(audio_path, args.name.clone())
            .with_context(|| format!("Failed to clone voice from {}", audio_path.display()))?;
        println!("Voice cloned: {} ({})", voice.voice_id, voice.name);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(text) = args.text.as_deref() else {
        let _ = Args::command().write_help(&mut std::io::stderr());
        return Ok(ExitCode::FAILURE);
    };

    let path = speaker.generate(text, args.voice.clone())?;
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn list_voices<B: Backend>(speaker: &Speaker<B>) -> Result<()> {
    let voices = speaker.list_voices().context("Failed to list voices")?;

    if voices.is_empty() {
        println!("No voices registered. Clone one with: local-tts --clone FILE --name NAME");
        return Ok(());
    }

    println!("Available voices:");
    for voice in voices {
        println!("  {} - {}", voice.voice_id, voice.name);
    }

    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.chain().find_map(|cause| cause.downcast_ref::<ClientError>()) {
        Some(ClientError::ServerUnavailable(server)) => {
            eprintln!("Local TTS server is not running at {server}");
            eprintln!("Start it with: local-tts-server");
        }
        Some(ClientError::Backend(BackendError::ConnectionFailed(msg))) => {
            eprintln!("Could not reach the TTS server: {msg}");
        }
        Some(ClientError::Backend(api @ BackendError::Api { .. })) => {
            eprintln!("{api}");
        }
        _ => eprintln!("Error: {err:#}"),
    }
}
