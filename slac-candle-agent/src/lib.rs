//! SLAC agent implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`latent::LatentModel`] - Sequential latent variable model of the environment
//! * [`slac::GaussianActor`] - Squashed Gaussian policy on windows of features and actions
//! * [`slac::TwinnedCritic`] - Two action-value functions on latent states and their target
//! * [`slac::EntCoef`] - Entropy coefficient with automatic tuning
//! * [`slac::Slac`] - The agent owning all of the above and the replay buffer
pub mod latent;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod slac;
mod tensor_batch;
pub mod util;
use serde::{Deserialize, Serialize};
pub use tensor_batch::{SacTensors, SequenceTensors};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),

    /// The Metal device with the given ordinal.
    Metal(usize),
}

impl From<&candle_core::Device> for Device {
    fn from(device: &candle_core::Device) -> Self {
        match device.location() {
            candle_core::DeviceLocation::Cpu => Self::Cpu,
            candle_core::DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            candle_core::DeviceLocation::Metal { gpu_id } => Self::Metal(gpu_id),
        }
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
            Device::Metal(n) => candle_core::Device::new_metal(n),
        }
    }
}
