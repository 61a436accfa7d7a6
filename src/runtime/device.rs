//! Compute device selection.

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Compute device an inference model can run on.
#[derive(ValueEnum, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// NVIDIA GPU via CUDA
    #[value(name = "cuda")]
    Cuda,

    /// Apple Neural Engine / GPU via CoreML
    #[value(name = "coreml")]
    CoreMl,

    /// General-purpose CPU path
    #[value(name = "cpu")]
    Cpu,
}

impl Device {
    /// Devices in the order they are tried when none is requested.
    pub const PREFERENCE: [Device; 3] = [Device::Cuda, Device::CoreMl, Device::Cpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::CoreMl => "coreml",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
