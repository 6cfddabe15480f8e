//! A small environment for tests and examples.
//!
//! A point moves on a line in `[-1, 1]` following the first component of the
//! action. The image shows the position as the brightness of all pixels and
//! the tactile sensors read the position scaled by `1000`. The reward is the
//! negative distance to the origin.
use crate::{Env, Observation, Step};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`DummyEnv`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DummyEnvConfig {
    /// Shape of image observations.
    pub image_shape: [usize; 3],

    /// Length of tactile observations.
    pub tactile_dim: usize,

    /// Dimension of actions accepted by the environment.
    pub action_dim: usize,

    /// The maximum number of steps in an episode.
    pub max_episode_steps: usize,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            image_shape: [3, 64, 64],
            tactile_dim: 6,
            action_dim: 4,
            max_episode_steps: 20,
        }
    }
}

impl DummyEnvConfig {
    /// Sets the shape of image observations.
    pub fn image_shape(mut self, v: [usize; 3]) -> Self {
        self.image_shape = v;
        self
    }

    /// Sets the length of tactile observations.
    pub fn tactile_dim(mut self, v: usize) -> Self {
        self.tactile_dim = v;
        self
    }

    /// Sets the dimension of actions.
    pub fn action_dim(mut self, v: usize) -> Self {
        self.action_dim = v;
        self
    }

    /// Sets the maximum number of steps in an episode.
    pub fn max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = v;
        self
    }
}

/// Dummy env.
pub struct DummyEnv {
    config: DummyEnvConfig,
    pos: f32,
    t: usize,
    rng: StdRng,
}

impl DummyEnv {
    fn obs(&self) -> Observation {
        let size = self.config.image_shape.iter().product();
        let pixel = ((self.pos + 1.0) * 127.5).round() as u8;
        Observation::new(
            vec![pixel; size],
            vec![self.pos * 1000.0; self.config.tactile_dim],
        )
    }
}

impl Env for DummyEnv {
    type Config = DummyEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            pos: 0.0,
            t: 0,
            rng: StdRng::seed_from_u64(seed as u64),
        })
    }

    fn reset(&mut self) -> Result<Observation> {
        self.pos = self.rng.gen_range(-0.5..0.5);
        self.t = 0;
        Ok(self.obs())
    }

    fn step(&mut self, act: &[f32]) -> Result<Step> {
        if act.len() != self.config.action_dim {
            return Err(crate::error::SlacError::ShapeMismatch {
                what: "action",
                expected: self.config.action_dim,
                actual: act.len(),
            }
            .into());
        }
        self.t += 1;
        self.pos = (self.pos + 0.1 * act[0]).clamp(-1.0, 1.0);
        let reward = -self.pos.abs();
        let is_truncated = self.t >= self.config.max_episode_steps;
        Ok(Step::new(self.obs(), reward, false, is_truncated))
    }

    fn max_episode_steps(&self) -> usize {
        self.config.max_episode_steps
    }

    fn sample_action(&mut self) -> Vec<f32> {
        (0..self.config.action_dim)
            .map(|_| self.rng.gen_range(-1.0..1.0))
            .collect()
    }
}
