//! Default implementation of the [`Evaluator`] trait.
//!
//! This module provides a simple evaluator that runs a fixed number of episodes
//! with the deterministic policy and calculates the average return.

use super::Evaluator;
use crate::{record::Record, Agent, Env};
use anyhow::Result;

/// Runs episodes with [`Agent::exploit()`] and returns the average return
/// (cumulative reward) as `return/test`.
///
/// The evaluator owns its environment, separate from the one used for
/// training, and its own observation window.
pub struct DefaultEvaluator<E: Env> {
    /// The number of episodes to run during evaluation.
    n_episodes: usize,

    /// The environment instance used for evaluation.
    env: E,
}

impl<E: Env, A: Agent<E>> Evaluator<E, A> for DefaultEvaluator<E> {
    /// Evaluates the agent by running episodes and calculating the average return.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment fails to reset or step, or if the
    /// policy fails to compute an action.
    fn evaluate(&mut self, agent: &mut A) -> Result<Record> {
        let mut window = agent.buffer().observation_window();
        let mut r_total = 0f32;

        for _ in 0..self.n_episodes {
            let obs = self.env.reset()?;
            window.reset_episode(&obs.image, &obs.tactile)?;

            loop {
                let act = agent.exploit(&window)?;
                let step = self.env.step(&agent.env_action(&act))?;
                r_total += step.reward;
                if step.is_done() {
                    break;
                }
                window.append(&step.obs.image, &step.obs.tactile, &act)?;
            }
        }

        Ok(Record::from_scalar(
            "return/test",
            r_total / self.n_episodes as f32,
        ))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`].
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for the environment
    /// * `seed` - Random seed for environment initialization
    /// * `n_episodes` - Number of episodes to run during evaluation
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }
}
