//! Agent.
use super::Env;
use crate::{
    history::RunHistory, record::Recorder, sequence_buffer::SequenceBuffer,
    window::ObservationWindow,
};
use anyhow::Result;
use log::debug;
use std::path::Path;

/// Represents a trainable agent acting on an [`ObservationWindow`].
///
/// The agent owns its [`SequenceBuffer`] and [`RunHistory`]. [`Agent::step()`]
/// is the control step shared by all implementations: it takes an action,
/// stores the transition and handles the end of an episode.
pub trait Agent<E: Env> {
    /// Samples an action from the stochastic policy.
    fn explore(&mut self, window: &ObservationWindow) -> Result<Vec<f32>>;

    /// Returns the deterministic action of the policy.
    fn exploit(&mut self, window: &ObservationWindow) -> Result<Vec<f32>>;

    /// Performs an optimization step of the model of the environment.
    fn update_latent(&mut self, recorder: &mut dyn Recorder) -> Result<()>;

    /// Performs an optimization step of the policy and the value function.
    fn update_sac(&mut self, recorder: &mut dyn Recorder) -> Result<()>;

    /// The replay buffer.
    fn buffer(&self) -> &SequenceBuffer;

    /// The replay buffer.
    fn buffer_mut(&mut self) -> &mut SequenceBuffer;

    /// The history of the run.
    fn history(&self) -> &RunHistory;

    /// The history of the run.
    fn history_mut(&mut self) -> &mut RunHistory;

    /// The value put in the last slot of actions sent to the environment.
    fn action_fill_value(&self) -> f32;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;

    /// Returns `true` if the buffer can provide batches.
    fn is_ready(&self) -> bool {
        self.buffer().is_ready()
    }

    /// Appends the fill value to an action of the agent.
    fn env_action(&self, action: &[f32]) -> Vec<f32> {
        let mut act = action.to_vec();
        act.push(self.action_fill_value());
        act
    }

    /// Resets the environment and starts a new episode in the window and the buffer.
    fn reset_episode(&mut self, env: &mut E, window: &mut ObservationWindow) -> Result<()> {
        let obs = env.reset()?;
        window.reset_episode(&obs.image, &obs.tactile)?;
        self.buffer_mut().reset_episode(&obs.image, &obs.tactile)
    }

    /// Performs an environment step and stores the transition.
    ///
    /// `t` is the number of steps taken in the current episode. The action is
    /// sampled uniformly if `is_random` is `true`, or from the policy
    /// otherwise. When the episode ends, the run history is saved, the
    /// environment is reset and `0` is returned. Otherwise `t + 1` is returned.
    fn step(
        &mut self,
        env: &mut E,
        window: &mut ObservationWindow,
        t: usize,
        is_random: bool,
    ) -> Result<usize> {
        let t = t + 1;

        let action = if is_random {
            let mut act = env.sample_action();
            act.truncate(self.buffer().action_dim());
            act
        } else {
            self.explore(window)?
        };
        let step = env.step(&self.env_action(&action))?;

        let done = step.is_done();
        // Truncation by the step limit does not stop bootstrapping
        let mask = if t == env.max_episode_steps() {
            false
        } else {
            done
        };
        window.append(&step.obs.image, &step.obs.tactile, &action)?;
        self.buffer_mut().append(
            &action,
            step.reward,
            mask,
            &step.obs.image,
            &step.obs.tactile,
            done,
        )?;
        self.history_mut().on_step();

        if done {
            self.history_mut().on_episode_end(step.reward);
            debug!(
                "Episode {} ended with reward {} at step {}",
                self.history().episodes,
                step.reward,
                self.history().total_steps
            );
            self.reset_episode(env, window)?;
            self.history().save()?;
            Ok(0)
        } else {
            Ok(t)
        }
    }
}
