//! Environment.
use super::{Observation, Step};
use anyhow::Result;

/// Represents an environment with image and tactile observations.
///
/// The action accepted by [`Env::step()`] has one more slot than the actions
/// produced by the agent. The agent fills the last slot with a constant,
/// see [`Agent::action_fill_value()`](crate::Agent::action_fill_value).
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Observation>;

    /// Performs an environment step.
    fn step(&mut self, act: &[f32]) -> Result<Step>;

    /// The maximum number of steps in an episode.
    fn max_episode_steps(&self) -> usize;

    /// Samples an action uniformly from the action space of the environment.
    fn sample_action(&mut self) -> Vec<f32>;
}
