//! Runs the HTTP server on an ephemeral port with a fake model and drives it
//! with the blocking client.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};

use local_tts::backend::{Backend, BackendError, HttpBackend, SynthesizeRequest};
use local_tts::client::{ClientError, Speaker};
use local_tts::runtime::{
    Device, ModelError, ModelLoader, ModelRuntime, SAMPLE_RATE, SpeechModel, audio,
};
use local_tts::service::{GenerationService, routes};
use local_tts::voice::VoiceRegistry;
use tempfile::TempDir;

/// Produces 0.1 s of audio per character at 16 kHz.
struct SineModel;

impl SpeechModel for SineModel {
    fn name(&self) -> &str {
        "sine"
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn synthesize(&mut self, text: &str, reference: Option<&Path>) -> Result<Vec<f32>, ModelError> {
        let amplitude = if reference.is_some() { 0.5 } else { 0.25 };
        let len = text.chars().count() * 1_600;
        Ok((0..len)
            .map(|i| amplitude * (i as f32 * 0.05).sin())
            .collect())
    }
}

struct SineLoader;

impl ModelLoader for SineLoader {
    fn is_available(&self, device: Device) -> bool {
        device == Device::Cpu
    }

    fn load(&self, _device: Device) -> Result<Box<dyn SpeechModel>, ModelError> {
        Ok(Box::new(SineModel))
    }
}

struct TestServer {
    url: String,
    data_dir: TempDir,
}

impl TestServer {
    fn output_dir(&self) -> PathBuf {
        self.data_dir.path().join("output")
    }
}

fn start_server() -> TestServer {
    let data_dir = TempDir::new().unwrap();
    let runtime = Arc::new(ModelRuntime::new());
    runtime.load(&SineLoader, None).unwrap();

    let service = Arc::new(GenerationService::new(
        runtime,
        VoiceRegistry::new(data_dir.path().join("voices")),
        data_dir.path().join("output"),
    ));

    let (tx, rx) = mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let (addr, server) = warp::serve(routes(service)).bind_ephemeral(([127, 0, 0, 1], 0));
            tx.send(addr).unwrap();
            server.await;
        });
    });

    let addr = rx.recv().unwrap();
    TestServer {
        url: format!("http://{addr}"),
        data_dir,
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|d| d.flatten().map(|e| e.path()).collect())
        .unwrap_or_default()
}

#[test]
fn test_health_reports_loaded_model() {
    let server = start_server();
    let backend = HttpBackend::new(&server.url);

    let health = backend.health().unwrap();

    assert!(health.ready);
    assert_eq!(health.model.as_deref(), Some("sine"));
    assert_eq!(health.device.as_deref(), Some("cpu"));
}

#[test]
fn test_clone_list_and_generate_with_voice() {
    let server = start_server();
    let cache = TempDir::new().unwrap();
    let reference = cache.path().join("alice.wav");
    std::fs::write(&reference, audio::encode_wav(&[0.1; 2_400], SAMPLE_RATE).unwrap()).unwrap();

    let speaker = Speaker::new(
        HttpBackend::new(&server.url),
        server.url.clone(),
        cache.path().join("tts"),
    );

    let cloned = speaker
        .clone_voice(&reference, Some("Alice".to_string()))
        .unwrap();
    assert!(!cloned.voice_id.is_empty());
    assert_eq!(cloned.name, "Alice");

    let voices = speaker.list_voices().unwrap();
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].voice_id, cloned.voice_id);
    assert_eq!(voices[0].name, "Alice");

    let path = speaker.generate("hello", Some(cloned.voice_id)).unwrap();
    assert!(path.starts_with(cache.path().join("tts")));
    let (samples, rate) = audio::read_wav(&path).unwrap();
    assert_eq!(rate, SAMPLE_RATE);
    // 0.5 s of audio resampled from 16 kHz
    assert_eq!(samples.len(), 12_000);
    assert_eq!(files_in(&server.output_dir()).len(), 1);
}

#[test]
fn test_generate_without_voice_returns_24khz_wav() {
    let server = start_server();
    let cache = TempDir::new().unwrap();
    let speaker = Speaker::new(
        HttpBackend::new(&server.url),
        server.url.clone(),
        cache.path().to_path_buf(),
    );

    let first = speaker.generate("hello world", None).unwrap();
    let second = speaker.generate("hello world", None).unwrap();

    assert_ne!(first, second);
    let (samples, rate) = audio::read_wav(&first).unwrap();
    assert_eq!(rate, SAMPLE_RATE);
    assert!(!samples.is_empty());
    assert_eq!(files_in(cache.path()).len(), 2);
}

#[test]
fn test_empty_text_is_an_api_error() {
    let server = start_server();
    let backend = HttpBackend::new(&server.url);

    let err = backend.synthesize(&SynthesizeRequest::new("")).unwrap_err();

    match err {
        BackendError::Api { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("No text provided"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert!(files_in(&server.output_dir()).is_empty());
}

#[test]
fn test_generate_with_server_down_creates_no_file() {
    let cache = TempDir::new().unwrap();
    // nothing listens on the discard port
    let url = "http://127.0.0.1:9";
    let speaker = Speaker::new(HttpBackend::new(url), url, cache.path().to_path_buf());

    let err = speaker.generate("hello", None).unwrap_err();

    assert!(matches!(err, ClientError::ServerUnavailable(_)));
    assert!(files_in(cache.path()).is_empty());
}
