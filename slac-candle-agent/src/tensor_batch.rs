//! Batches of the replay buffer as [`Tensor`]s.
//!
//! [`Tensor`]: https://docs.rs/candle-core/0.8.4/candle_core/struct.Tensor.html
use anyhow::Result;
use candle_core::{Device, Tensor};
use slac_core::sequence_buffer::{SacBatch, SequenceBatch};

/// [`SequenceBatch`] on a device.
pub struct SequenceTensors {
    /// Raw pixels, `(B, S + 1, C, H, W)` of `u8`.
    pub image: Tensor,

    /// Raw tactile readings, `(B, S + 1, T)`.
    pub tactile: Tensor,

    /// Actions, `(B, S, A)`.
    pub action: Tensor,

    /// Rewards, `(B, S, 1)`.
    pub reward: Tensor,

    /// Termination flags, `(B, S, 1)`.
    pub done: Tensor,

    /// Bootstrapping masks, `(B, S, 1)`.
    pub mask: Tensor,
}

impl SequenceTensors {
    /// Moves a batch to the device.
    pub fn from_batch(batch: SequenceBatch, device: &Device) -> Result<Self> {
        let (b, s) = (batch.batch_size, batch.num_sequences);
        let [c, h, w] = batch.image_shape;

        Ok(Self {
            image: Tensor::from_vec(batch.image, (b, s + 1, c, h, w), device)?,
            tactile: Tensor::from_vec(batch.tactile, (b, s + 1, batch.tactile_dim), device)?,
            action: Tensor::from_vec(batch.action, (b, s, batch.action_dim), device)?,
            reward: Tensor::from_vec(batch.reward, (b, s, 1), device)?,
            done: Tensor::from_vec(batch.done, (b, s, 1), device)?,
            mask: Tensor::from_vec(batch.mask, (b, s, 1), device)?,
        })
    }
}

/// [`SacBatch`] on a device.
pub struct SacTensors {
    /// Raw pixels, `(B, S + 1, C, H, W)` of `u8`.
    pub image: Tensor,

    /// Raw tactile readings, `(B, S + 1, T)`.
    pub tactile: Tensor,

    /// Actions, `(B, S, A)`.
    pub action: Tensor,

    /// Reward of the last transition, `(B, 1)`.
    pub reward: Tensor,

    /// Termination flag of the last transition, `(B, 1)`.
    pub done: Tensor,

    /// Bootstrapping mask of the last transition, `(B, 1)`.
    pub mask: Tensor,
}

impl SacTensors {
    /// Moves a batch to the device.
    pub fn from_batch(batch: SacBatch, device: &Device) -> Result<Self> {
        let (b, s) = (batch.batch_size, batch.num_sequences);
        let [c, h, w] = batch.image_shape;

        Ok(Self {
            image: Tensor::from_vec(batch.image, (b, s + 1, c, h, w), device)?,
            tactile: Tensor::from_vec(batch.tactile, (b, s + 1, batch.tactile_dim), device)?,
            action: Tensor::from_vec(batch.action, (b, s, batch.action_dim), device)?,
            reward: Tensor::from_vec(batch.reward, (b, 1), device)?,
            done: Tensor::from_vec(batch.done, (b, 1), device)?,
            mask: Tensor::from_vec(batch.mask, (b, 1), device)?,
        })
    }
}
