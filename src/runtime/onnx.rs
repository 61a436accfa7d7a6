//! ONNX Runtime speech model.
//!
//! A model directory holds:
//! - `model.onnx`: graph taking `input_ids` `[1, T]` (i64) and, for models
//!   that support cloning, `ref_audio` `[1, N]` (f32 at the model rate);
//!   producing a f32 waveform (`waveform`, or the first output).
//! - `tokenizer.json`: HuggingFace tokenizer for the text input.
//! - `config.json` (optional): `{"name": ..., "sample_rate": ...}`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ort::execution_providers::{CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::value::{Tensor, Value};
use serde::Deserialize;
use tokenizers::Tokenizer;

use super::{Device, ModelError, ModelLoader, SAMPLE_RATE, SpeechModel, audio};

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";

const INPUT_IDS: &str = "input_ids";
const REF_AUDIO: &str = "ref_audio";
const WAVEFORM: &str = "waveform";

#[derive(Debug, Default, Deserialize)]
struct ModelConfig {
    name: Option<String>,
    sample_rate: Option<u32>,
}

impl ModelConfig {
    fn read(model_dir: &Path) -> Result<Self, ModelError> {
        let path = model_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(&path)?;
        serde_json::from_str(&json)
            .map_err(|e| ModelError::Load(format!("invalid {}: {e}", path.display())))
    }
}

/// Loads [`OnnxSpeechModel`]s from a model directory.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_dir: PathBuf,
}

impl OnnxLoader {
    pub fn new(model_dir: PathBuf) -> Self {
        Self { model_dir }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

impl ModelLoader for OnnxLoader {
    fn is_available(&self, device: Device) -> bool {
        match device {
            Device::Cpu => true,
            Device::Cuda => CUDAExecutionProvider::default().is_available().unwrap_or(false),
            Device::CoreMl => CoreMLExecutionProvider::default()
                .is_available()
                .unwrap_or(false),
        }
    }

    fn load(&self, device: Device) -> Result<Box<dyn SpeechModel>, ModelError> {
        Ok(Box::new(OnnxSpeechModel::load(&self.model_dir, device)?))
    }
}

/// Text-to-speech model backed by an ONNX Runtime session.
pub struct OnnxSpeechModel {
    name: String,
    session: Session,
    tokenizer: Tokenizer,
    sample_rate: u32,
    accepts_reference: bool,
}

impl OnnxSpeechModel {
    pub fn load(model_dir: &Path, device: Device) -> Result<Self, ModelError> {
        let model_path = model_dir.join(MODEL_FILE);
        if !model_path.is_file() {
            return Err(ModelError::Load(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        let config = ModelConfig::read(model_dir)?;
        let tokenizer = Tokenizer::from_file(model_dir.join(TOKENIZER_FILE))
            .map_err(|e| ModelError::Load(format!("failed to load tokenizer: {e}")))?;

        let builder = Session::builder().map_err(|e| ModelError::Load(e.to_string()))?;
        let builder = match device {
            Device::Cuda => builder
                .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()]),
            Device::CoreMl => builder
                .with_execution_providers([CoreMLExecutionProvider::default().build().error_on_failure()]),
            Device::Cpu => Ok(builder),
        }
        .map_err(|e| ModelError::Load(format!("failed enabling {device} execution provider: {e}")))?;

        let session = builder.commit_from_file(&model_path).map_err(|e| {
            ModelError::Load(format!(
                "failed to load onnx model from {}: {e}",
                model_path.display()
            ))
        })?;

        let accepts_reference = session.inputs.iter().any(|input| input.name == REF_AUDIO);
        let name = config.name.unwrap_or_else(|| {
            model_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "onnx-tts".to_string())
        });

        tracing::info!(
            model = %name,
            voice_cloning = accepts_reference,
            "ONNX session created"
        );

        Ok(Self {
            name,
            session,
            tokenizer,
            sample_rate: config.sample_rate.unwrap_or(SAMPLE_RATE),
            accepts_reference,
        })
    }

    fn encode_text(&self, text: &str) -> Result<Vec<i64>, ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::Inference(format!("tokenization failed: {e}")))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        if ids.is_empty() {
            return Err(ModelError::Inference("text produced no tokens".to_string()));
        }
        Ok(ids)
    }

    fn reference_samples(&self, path: &Path) -> Result<Vec<f32>, ModelError> {
        let (samples, rate) = audio::read_wav(path)
            .map_err(|e| ModelError::Audio(format!("{}: {e}", path.display())))?;
        Ok(audio::resample(&samples, rate, self.sample_rate))
    }
}

impl SpeechModel for OnnxSpeechModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(&mut self, text: &str, reference: Option<&Path>) -> Result<Vec<f32>, ModelError> {
        let ids = self.encode_text(text)?;

        let mut inputs: HashMap<String, Value> = HashMap::new();
        let ids_tensor = Tensor::from_array(([1, ids.len()], ids))
            .map_err(|e| ModelError::Inference(format!("failed to build input_ids: {e}")))?;
        inputs.insert(INPUT_IDS.to_string(), ids_tensor.into());

        match reference {
            Some(path) if self.accepts_reference => {
                let samples = self.reference_samples(path)?;
                let ref_tensor = Tensor::from_array(([1, samples.len()], samples))
                    .map_err(|e| ModelError::Inference(format!("failed to build ref_audio: {e}")))?;
                inputs.insert(REF_AUDIO.to_string(), ref_tensor.into());
            }
            Some(_) => tracing::warn!(model = %self.name, "Model has no reference input, ignoring voice"),
            None => {}
        }

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let samples = if let Some(output) = outputs.get(WAVEFORM) {
            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference(format!("bad waveform output: {e}")))?;
            data.to_vec()
        } else if let Some((_, output)) = outputs.iter().next() {
            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference(format!("bad waveform output: {e}")))?;
            data.to_vec()
        } else {
            return Err(ModelError::Inference("model returned no outputs".to_string()));
        };

        Ok(samples)
    }
}
