//! Model lifecycle and serialized inference.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

use thiserror::Error;

use super::{Device, ModelLoader, SAMPLE_RATE, SpeechModel, audio};

/// Lifecycle of the process-wide model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Unloaded,
    Loading,
    Ready,
}

impl RuntimeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RuntimeState::Unloaded,
            1 => RuntimeState::Loading,
            _ => RuntimeState::Ready,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RuntimeState::Unloaded => 0,
            RuntimeState::Loading => 1,
            RuntimeState::Ready => 2,
        }
    }
}

/// Errors surfaced by the model runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Model is not ready (state: {0:?})")]
    NotReady(RuntimeState),

    #[error("Model load already attempted (state: {0:?})")]
    AlreadyLoaded(RuntimeState),

    #[error("Requested device is not available: {0}")]
    DeviceUnavailable(Device),

    #[error("Model failed to load: {0}")]
    LoadFailed(String),

    #[error("Generation failed: {0}")]
    Inference(String),
}

/// Owns the loaded speech model and serializes access to it.
///
/// The runtime starts `Unloaded`, moves to `Loading` on the first call to
/// [`ModelRuntime::load`] and to `Ready` once the model is in place. It never
/// moves backwards.
pub struct ModelRuntime {
    state: AtomicU8,
    device: OnceLock<Device>,
    model_name: OnceLock<String>,
    model: OnceLock<Mutex<Box<dyn SpeechModel>>>,
}

impl ModelRuntime {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RuntimeState::Unloaded.as_u8()),
            device: OnceLock::new(),
            model_name: OnceLock::new(),
            model: OnceLock::new(),
        }
    }

    pub fn state(&self) -> RuntimeState {
        RuntimeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == RuntimeState::Ready
    }

    /// Device the model was loaded on, once loading has picked one.
    pub fn device(&self) -> Option<Device> {
        self.device.get().copied()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.get().map(String::as_str)
    }

    /// Pick the requested device, or the first available one in preference order.
    pub fn select_device<L: ModelLoader + ?Sized>(
        loader: &L,
        requested: Option<Device>,
    ) -> Result<Device, RuntimeError> {
        if let Some(device) = requested {
            return if loader.is_available(device) {
                Ok(device)
            } else {
                Err(RuntimeError::DeviceUnavailable(device))
            };
        }

        Ok(Device::PREFERENCE
            .into_iter()
            .find(|&d| d == Device::Cpu || loader.is_available(d))
            .unwrap_or(Device::Cpu))
    }

    /// Load the model. Only the first call does any work.
    pub fn load<L: ModelLoader + ?Sized>(
        &self,
        loader: &L,
        requested: Option<Device>,
    ) -> Result<Device, RuntimeError> {
        let unloaded = RuntimeState::Unloaded.as_u8();
        let loading = RuntimeState::Loading.as_u8();
        if let Err(current) =
            self.state
                .compare_exchange(unloaded, loading, Ordering::AcqRel, Ordering::Acquire)
        {
            return Err(RuntimeError::AlreadyLoaded(RuntimeState::from_u8(current)));
        }

        let started = Instant::now();
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
            let device = Self::select_device(loader, requested)?;
            let _ = self.device.set(device);
            tracing::info!(%device, "Loading speech model");
            let model = loader
                .load(device)
                .map_err(|e| RuntimeError::LoadFailed(e.to_string()))?;
            Ok::<_, RuntimeError>((device, model))
        }));

        let (device, model) = match loaded {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(e),
            Err(payload) => return Err(RuntimeError::LoadFailed(panic_message(payload.as_ref()))),
        };

        let _ = self.model_name.set(model.name().to_string());
        if self.model.set(Mutex::new(model)).is_err() {
            return Err(RuntimeError::LoadFailed("model slot already filled".to_string()));
        }
        self.state
            .store(RuntimeState::Ready.as_u8(), Ordering::Release);

        tracing::info!(
            %device,
            model = self.model_name().unwrap_or_default(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Speech model ready"
        );
        Ok(device)
    }

    /// Synthesize `text`, conditioned on `reference` when it points at a file.
    ///
    /// Calls are serialized; the returned samples are always at [`SAMPLE_RATE`].
    pub fn synthesize(&self, text: &str, reference: Option<&Path>) -> Result<Vec<f32>, RuntimeError> {
        let slot = match self.model.get() {
            Some(slot) if self.is_ready() => slot,
            _ => return Err(RuntimeError::NotReady(self.state())),
        };

        let reference = match reference {
            Some(path) if path.is_file() => Some(path),
            Some(path) => {
                tracing::warn!(path = %path.display(), "Reference audio missing, using default voice");
                None
            }
            None => None,
        };

        let mut model = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let native_rate = model.sample_rate();

        let started = Instant::now();
        let samples = match panic::catch_unwind(AssertUnwindSafe(|| model.synthesize(text, reference))) {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => return Err(RuntimeError::Inference(e.to_string())),
            Err(payload) => return Err(RuntimeError::Inference(panic_message(payload.as_ref()))),
        };
        drop(model);

        if samples.is_empty() {
            return Err(RuntimeError::Inference("model produced no audio".to_string()));
        }

        let samples = audio::resample(&samples, native_rate, SAMPLE_RATE);
        tracing::debug!(
            samples = samples.len(),
            conditioned = reference.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synthesis finished"
        );
        Ok(samples)
    }
}

impl Default for ModelRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "inference panicked".to_string()
    }
}
