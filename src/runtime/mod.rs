//! Speech model runtime.
//!
//! Owns the single loaded inference model for the process, tracks its
//! `Unloaded → Loading → Ready` lifecycle and serializes synthesis calls.

pub mod audio;
mod device;
mod onnx;
mod state;

use std::path::Path;

use thiserror::Error;

pub use device::Device;
pub use onnx::{OnnxLoader, OnnxSpeechModel};
pub use state::{ModelRuntime, RuntimeError, RuntimeState};

/// Sample rate of all generated audio.
pub const SAMPLE_RATE: u32 = 24_000;

/// Errors raised by a speech model implementation.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Load error: {0}")]
    Load(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A loaded text-to-speech model.
///
/// Implementations hold internal state that is not safe to use from
/// several threads at once; [`ModelRuntime`] serializes calls.
pub trait SpeechModel: Send {
    /// Human-readable model name.
    fn name(&self) -> &str;

    /// Native sample rate of the samples returned by `synthesize`.
    fn sample_rate(&self) -> u32;

    /// Synthesize mono samples for `text`.
    ///
    /// When `reference` is given the output is conditioned on that recording,
    /// otherwise the model's default voice is used.
    fn synthesize(&mut self, text: &str, reference: Option<&Path>) -> Result<Vec<f32>, ModelError>;
}

/// Creates speech models for a given device.
#[cfg_attr(test, mockall::automock)]
pub trait ModelLoader {
    /// Whether `device` can be used on this machine.
    fn is_available(&self, device: Device) -> bool;

    /// Load the model onto `device`.
    fn load(&self, device: Device) -> Result<Box<dyn SpeechModel>, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Emits one sample per input byte, tagging conditioned output with 0.5.
    struct FakeModel {
        rate: u32,
        calls: Arc<Mutex<Vec<Option<PathBuf>>>>,
    }

    impl SpeechModel for FakeModel {
        fn name(&self) -> &str {
            "fake"
        }

        fn sample_rate(&self) -> u32 {
            self.rate
        }

        fn synthesize(&mut self, text: &str, reference: Option<&Path>) -> Result<Vec<f32>, ModelError> {
            self.calls.lock().unwrap().push(reference.map(Path::to_path_buf));
            if text == "fail" {
                return Err(ModelError::Inference("boom".to_string()));
            }
            if text == "panic" {
                panic!("kernel exploded");
            }
            let value = if reference.is_some() { 0.5 } else { 0.1 };
            Ok(vec![value; text.len() * 100])
        }
    }

    fn loader_with_rate(rate: u32) -> (MockModelLoader, Arc<Mutex<Vec<Option<PathBuf>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut loader = MockModelLoader::new();
        loader
            .expect_is_available()
            .returning(|device| device == Device::Cpu);
        let model_calls = Arc::clone(&calls);
        loader.expect_load().returning(move |_| {
            Ok(Box::new(FakeModel {
                rate,
                calls: Arc::clone(&model_calls),
            }))
        });
        (loader, calls)
    }

    fn ready_runtime(rate: u32) -> (ModelRuntime, Arc<Mutex<Vec<Option<PathBuf>>>>) {
        let (loader, calls) = loader_with_rate(rate);
        let runtime = ModelRuntime::new();
        runtime.load(&loader, None).unwrap();
        (runtime, calls)
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    #[test]
    fn test_runtime_starts_unloaded() {
        let runtime = ModelRuntime::new();

        assert_eq!(runtime.state(), RuntimeState::Unloaded);
        assert!(!runtime.is_ready());
        assert_eq!(runtime.device(), None);
    }

    #[test]
    fn test_synthesize_before_load_is_not_ready() {
        let runtime = ModelRuntime::new();

        let result = runtime.synthesize("hello", None);

        assert!(matches!(
            result.unwrap_err(),
            RuntimeError::NotReady(RuntimeState::Unloaded)
        ));
    }

    #[test]
    fn test_load_moves_to_ready() {
        let (runtime, _) = ready_runtime(SAMPLE_RATE);

        assert_eq!(runtime.state(), RuntimeState::Ready);
        assert_eq!(runtime.device(), Some(Device::Cpu));
        assert_eq!(runtime.model_name(), Some("fake"));
    }

    #[test]
    fn test_load_only_once() {
        let (runtime, _) = ready_runtime(SAMPLE_RATE);
        let (loader, _) = loader_with_rate(SAMPLE_RATE);

        let result = runtime.load(&loader, None);

        assert!(matches!(
            result.unwrap_err(),
            RuntimeError::AlreadyLoaded(RuntimeState::Ready)
        ));
        assert!(runtime.is_ready());
    }

    #[test]
    fn test_load_failure_never_reports_ready() {
        let mut loader = MockModelLoader::new();
        loader.expect_is_available().returning(|_| false);
        loader
            .expect_load()
            .returning(|_| Err(ModelError::Load("missing weights".to_string())));

        let runtime = ModelRuntime::new();
        let result = runtime.load(&loader, None);

        assert!(matches!(result.unwrap_err(), RuntimeError::LoadFailed(msg) if msg.contains("missing weights")));
        assert!(!runtime.is_ready());
        assert!(matches!(
            runtime.synthesize("hello", None).unwrap_err(),
            RuntimeError::NotReady(RuntimeState::Loading)
        ));
    }

    #[test]
    fn test_load_panic_is_reported_as_failure() {
        let mut loader = MockModelLoader::new();
        loader.expect_is_available().returning(|_| false);
        loader
            .expect_load()
            .returning(|_| panic!("dylib not found"));

        let runtime = ModelRuntime::new();
        let result = runtime.load(&loader, None);

        assert!(matches!(result.unwrap_err(), RuntimeError::LoadFailed(msg) if msg.contains("dylib")));
        assert!(!runtime.is_ready());
    }

    // ===========================================
    // Device selection
    // ===========================================

    #[test]
    fn test_select_device_prefers_accelerator() {
        let mut loader = MockModelLoader::new();
        loader.expect_is_available().returning(|_| true);

        assert_eq!(ModelRuntime::select_device(&loader, None).unwrap(), Device::Cuda);
    }

    #[test]
    fn test_select_device_falls_back_to_coreml_then_cpu() {
        let mut coreml_only = MockModelLoader::new();
        coreml_only
            .expect_is_available()
            .returning(|device| device == Device::CoreMl);
        assert_eq!(
            ModelRuntime::select_device(&coreml_only, None).unwrap(),
            Device::CoreMl
        );

        let mut nothing = MockModelLoader::new();
        nothing.expect_is_available().returning(|_| false);
        assert_eq!(ModelRuntime::select_device(&nothing, None).unwrap(), Device::Cpu);
    }

    #[test]
    fn test_select_device_honours_request() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_is_available()
            .returning(|device| device != Device::Cuda);

        assert_eq!(
            ModelRuntime::select_device(&loader, Some(Device::Cpu)).unwrap(),
            Device::Cpu
        );
        assert!(matches!(
            ModelRuntime::select_device(&loader, Some(Device::Cuda)).unwrap_err(),
            RuntimeError::DeviceUnavailable(Device::Cuda)
        ));
    }

    // ===========================================
    // Synthesis
    // ===========================================

    #[test]
    fn test_synthesize_unconditioned() {
        let (runtime, calls) = ready_runtime(SAMPLE_RATE);

        let samples = runtime.synthesize("hello world", None).unwrap();

        assert_eq!(samples.len(), 1100);
        assert_eq!(calls.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn test_synthesize_with_existing_reference() {
        let temp_dir = TempDir::new().unwrap();
        let reference = temp_dir.path().join("reference.wav");
        std::fs::write(&reference, b"RIFF").unwrap();
        let (runtime, calls) = ready_runtime(SAMPLE_RATE);

        let samples = runtime.synthesize("hi", Some(reference.as_path())).unwrap();

        assert!(samples.iter().all(|&s| s == 0.5));
        assert_eq!(calls.lock().unwrap().as_slice(), &[Some(reference)]);
    }

    #[test]
    fn test_synthesize_missing_reference_is_unconditioned() {
        let (runtime, calls) = ready_runtime(SAMPLE_RATE);

        let samples = runtime
            .synthesize("hi", Some(Path::new("/nonexistent/reference.wav")))
            .unwrap();

        assert!(samples.iter().all(|&s| s == 0.1));
        assert_eq!(calls.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn test_synthesize_resamples_to_output_rate() {
        let (runtime, _) = ready_runtime(48_000);

        let samples = runtime.synthesize("hello", None).unwrap();

        // 500 samples at 48 kHz become 250 at 24 kHz
        assert_eq!(samples.len(), 250);
    }

    #[test]
    fn test_synthesize_model_error_is_inference_failure() {
        let (runtime, _) = ready_runtime(SAMPLE_RATE);

        let result = runtime.synthesize("fail", None);

        assert!(matches!(result.unwrap_err(), RuntimeError::Inference(msg) if msg.contains("boom")));
        assert!(runtime.synthesize("still works", None).is_ok());
    }

    #[test]
    fn test_synthesize_panic_does_not_poison_runtime() {
        let (runtime, _) = ready_runtime(SAMPLE_RATE);

        let result = runtime.synthesize("panic", None);

        assert!(matches!(result.unwrap_err(), RuntimeError::Inference(msg) if msg.contains("kernel exploded")));
        assert!(runtime.is_ready());
        assert!(runtime.synthesize("after panic", None).is_ok());
    }

    #[test]
    fn test_synthesize_calls_are_serialized() {
        struct ExclusiveModel {
            busy: Arc<std::sync::atomic::AtomicBool>,
        }

        impl SpeechModel for ExclusiveModel {
            fn name(&self) -> &str {
                "exclusive"
            }

            fn sample_rate(&self) -> u32 {
                SAMPLE_RATE
            }

            fn synthesize(&mut self, _text: &str, _reference: Option<&Path>) -> Result<Vec<f32>, ModelError> {
                use std::sync::atomic::Ordering;
                if self.busy.swap(true, Ordering::SeqCst) {
                    return Err(ModelError::Inference("concurrent call".to_string()));
                }
                std::thread::sleep(std::time::Duration::from_millis(5));
                self.busy.store(false, Ordering::SeqCst);
                Ok(vec![0.0; 10])
            }
        }

        let mut loader = MockModelLoader::new();
        loader.expect_is_available().returning(|_| false);
        loader.expect_load().returning(|_| {
            Ok(Box::new(ExclusiveModel {
                busy: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            }))
        });
        let runtime = Arc::new(ModelRuntime::new());
        runtime.load(&loader, None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runtime = Arc::clone(&runtime);
                std::thread::spawn(move || runtime.synthesize("text", None))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    // ===========================================
    // Audio helpers
    // ===========================================

    #[test]
    fn test_encode_wav_is_24khz_mono() {
        let bytes = audio::encode_wav(&[0.0, 0.5, -0.5, 1.5], SAMPLE_RATE).unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_decode_wav_downmixes_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..10 {
                writer.write_sample(i16::MAX).unwrap();
                writer.write_sample(0_i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let (samples, rate) = audio::decode_wav(&cursor.into_inner()).unwrap();

        assert_eq!(rate, 16_000);
        assert_eq!(samples.len(), 10);
        assert!(samples.iter().all(|&s| (s - 0.5).abs() < 0.01));
    }

    #[test]
    fn test_resample_identity_and_ratio() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();

        assert_eq!(audio::resample(&samples, 24_000, 24_000), samples);
        assert_eq!(audio::resample(&samples, 12_000, 24_000).len(), 200);
        assert_eq!(audio::resample(&samples, 48_000, 24_000).len(), 50);
        assert!(audio::resample(&[], 48_000, 24_000).is_empty());
    }
}
