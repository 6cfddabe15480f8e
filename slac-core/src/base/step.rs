//! Environment step.

/// An observation of the environment.
///
/// The image is a raw `(C, H, W)` pixel array and the tactile observation is
/// a vector of raw sensor readings. Both are normalized in the models.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Pixels in row-major `(C, H, W)` order.
    pub image: Vec<u8>,

    /// Tactile sensor readings.
    pub tactile: Vec<f32>,
}

impl Observation {
    /// Constructs an [`Observation`].
    pub fn new(image: Vec<u8>, tactile: Vec<f32>) -> Self {
        Self { image, tactile }
    }
}

/// The result of an environment step: the next observation, the reward and
/// flags telling if the episode has ended.
#[derive(Debug, Clone)]
pub struct Step {
    /// Observation after the step.
    pub obs: Observation,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: bool,

    /// Flag denoting if episode is truncated by the step limit.
    pub is_truncated: bool,
}

impl Step {
    /// Constructs a [`Step`] object.
    pub fn new(obs: Observation, reward: f32, is_terminated: bool, is_truncated: bool) -> Self {
        Self {
            obs,
            reward,
            is_terminated,
            is_truncated,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}
