//! Batches sampled from [`SequenceBuffer`](super::SequenceBuffer).
//!
//! All arrays are flattened in row-major order with the batch axis first.

/// A batch of windows used for training the latent variable model.
#[derive(Debug, Clone)]
pub struct SequenceBatch {
    /// The number of windows.
    pub batch_size: usize,

    /// The number of transitions in each window.
    pub num_sequences: usize,

    /// Shape of a single image, `[channels, height, width]`.
    pub image_shape: [usize; 3],

    /// Length of a tactile observation.
    pub tactile_dim: usize,

    /// Dimension of an action.
    pub action_dim: usize,

    /// Raw pixels, `(B, S + 1, C, H, W)`.
    pub image: Vec<u8>,

    /// Raw tactile values, `(B, S + 1, T)`.
    pub tactile: Vec<f32>,

    /// Actions, `(B, S, A)`.
    pub action: Vec<f32>,

    /// Rewards, `(B, S)`.
    pub reward: Vec<f32>,

    /// Episode termination flags as `0.0` or `1.0`, `(B, S)`.
    pub done: Vec<f32>,

    /// Bootstrapping masks as `0.0` or `1.0`, `(B, S)`.
    pub mask: Vec<f32>,
}

/// A batch of windows used for training the actor and the critic.
///
/// Observations and actions cover the whole window, while reward and flags
/// are those of the last transition.
#[derive(Debug, Clone)]
pub struct SacBatch {
    /// The number of windows.
    pub batch_size: usize,

    /// The number of transitions in each window.
    pub num_sequences: usize,

    /// Shape of a single image, `[channels, height, width]`.
    pub image_shape: [usize; 3],

    /// Length of a tactile observation.
    pub tactile_dim: usize,

    /// Dimension of an action.
    pub action_dim: usize,

    /// Raw pixels, `(B, S + 1, C, H, W)`.
    pub image: Vec<u8>,

    /// Raw tactile values, `(B, S + 1, T)`.
    pub tactile: Vec<f32>,

    /// Actions, `(B, S, A)`.
    pub action: Vec<f32>,

    /// Reward of the last transition, `(B,)`.
    pub reward: Vec<f32>,

    /// Termination flag of the last transition, `(B,)`.
    pub done: Vec<f32>,

    /// Bootstrapping mask of the last transition, `(B,)`.
    pub mask: Vec<f32>,
}

impl From<SequenceBatch> for SacBatch {
    fn from(batch: SequenceBatch) -> Self {
        let s = batch.num_sequences;
        let last = |v: Vec<f32>| -> Vec<f32> { v.chunks(s).map(|c| c[s - 1]).collect() };

        Self {
            batch_size: batch.batch_size,
            num_sequences: s,
            image_shape: batch.image_shape,
            tactile_dim: batch.tactile_dim,
            action_dim: batch.action_dim,
            image: batch.image,
            tactile: batch.tactile,
            action: batch.action,
            reward: last(batch.reward),
            done: last(batch.done),
            mask: last(batch.mask),
        }
    }
}
