//! Train [`Agent`].
mod config;
use crate::{error::SlacError, evaluator::Evaluator, record::Recorder, Agent, Env};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
use std::{path::Path, time::SystemTime};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages training loop and related objects.
///
/// # Training loop
///
/// 0. Fail with [`SlacError::InvalidConfig`] if an episode can be longer than
///    the capacity of the replay buffer, which only samples episodes whose
///    transitions are all live.
/// 1. Reset [`Env`] and start an episode in the observation window and
///    the replay buffer of the agent.
/// 2. Take `initial_collection_steps` environment steps with uniformly random
///    actions.
/// 3. If the buffer cannot provide a window yet, fail with
///    [`SlacError::WarmUp`]. Otherwise, update the latent variable model
///    `initial_learning_steps` times.
/// 4. For the remaining environment steps:
///     1. Take an environment step with the stochastic policy.
///     2. Update the latent variable model, then the actor and the critic.
///     3. Every `eval_interval` environment steps, evaluate the agent and
///        write `return/test` to the recorder. The parameters are saved in
///        `(model_dir)/step(env_steps)`.
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|action|B[Env]
///     B -->|Step|A
///     A -->|transition|C[SequenceBuffer]
///     C -->|SequenceBatch|D[Latent model]
///     C -->|SacBatch|E[Actor-critic]
/// ```
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self { config }
    }

    fn save_model<E: Env, A: Agent<E>>(agent: &A, model_dir: &str, steps: usize) -> Result<()> {
        let path = Path::new(model_dir).join(format!("step{}", steps));
        agent.save_params(&path)?;
        info!("Saved the model in {:?}", &path);
        Ok(())
    }

    /// Train the agent.
    pub fn train<E, A, D>(
        &mut self,
        agent: &mut A,
        env: &mut E,
        recorder: &mut dyn Recorder,
        evaluator: &mut D,
    ) -> Result<()>
    where
        E: Env,
        A: Agent<E>,
        D: Evaluator<E, A>,
    {
        let config = &self.config;
        if env.max_episode_steps() > agent.buffer().capacity() {
            return Err(SlacError::InvalidConfig(format!(
                "episodes of {} steps do not fit in the buffer of {} transitions",
                env.max_episode_steps(),
                agent.buffer().capacity()
            ))
            .into());
        }
        let mut window = agent.buffer().observation_window();
        let mut t = 0;
        agent.reset_episode(env, &mut window)?;

        // Collect trajectories with random actions
        for _ in 0..config.initial_collection_steps {
            t = agent.step(env, &mut window, t, true)?;
        }
        info!(
            "Collected {} transitions with random actions",
            config.initial_collection_steps
        );

        if !agent.is_ready() {
            return Err(SlacError::WarmUp {
                required: agent.buffer().num_sequences(),
                len: agent.buffer().len(),
            }
            .into());
        }

        // Pre-train the latent variable model
        let timer = SystemTime::now();
        for _ in 0..config.initial_learning_steps {
            agent.update_latent(recorder)?;
        }
        info!(
            "Updated the latent model {} times in {:.1} sec",
            config.initial_learning_steps,
            timer.elapsed()?.as_secs_f32()
        );

        for env_steps in (config.initial_collection_steps + 1)..=config.num_steps {
            t = agent.step(env, &mut window, t, false)?;
            agent.update_latent(recorder)?;
            agent.update_sac(recorder)?;

            if config.eval_interval > 0 && env_steps % config.eval_interval == 0 {
                info!("Starts evaluation of the trained model");
                let record = evaluator.evaluate(agent)?;
                info!(
                    "Steps: {:<8} Return: {:<5.1}",
                    env_steps,
                    record.get_scalar("return/test")?
                );
                recorder.write(env_steps, record);
                if let Some(model_dir) = &config.model_dir {
                    Self::save_model::<E, A>(agent, model_dir, env_steps)?;
                }
            }

            if config.flush_record_interval > 0 && env_steps % config.flush_record_interval == 0 {
                recorder.flush();
            }
        }

        recorder.flush();
        Ok(())
    }
}
