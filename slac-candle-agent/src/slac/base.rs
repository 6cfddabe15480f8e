use super::{EntCoef, GaussianActor, SlacConfig, TwinnedCritic};
use crate::{
    latent::LatentModel,
    model::{SubModel1, SubModel2},
    util::{feature_actions, OutDim},
    SacTensors, SequenceTensors,
};
use anyhow::Result;
use candle_core::{IndexOp, Tensor, D};
use candle_nn::loss::mse;
use log::{info, trace};
use serde::{de::DeserializeOwned, Serialize};
use slac_core::{
    error::SlacError,
    history::RunHistory,
    record::{Record, RecordValue, Recorder},
    sequence_buffer::SequenceBuffer,
    window::ObservationWindow,
    Agent, Env,
};
use std::{fmt::Debug, fs, path::Path, path::PathBuf};

const ENCODER_FILE: &str = "encoder.safetensors";
const LATENT_FILE: &str = "latent.safetensors";
const ACTOR_FILE: &str = "actor.safetensors";
const CRITIC_FILE: &str = "critic.safetensors";

/// Inputs of the actor-critic update computed from a [`SacTensors`].
struct PreparedBatch {
    // Latent state at the last step of the window and at the next step
    z: Tensor,
    next_z: Tensor,
    action: Tensor,
    // Feature-action windows ending at the last and the next step
    feature_action: Tensor,
    next_feature_action: Tensor,
}

/// Stochastic latent actor-critic (SLAC) agent.
///
/// The latent variable model learns the environment from sequences of
/// image and tactile observations. The critic works on latent states sampled
/// from the posterior, while the actor works on encoded observations and
/// past actions, which are available at execution time.
pub struct Slac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    latent: LatentModel,
    actor: GaussianActor<P>,
    critic: TwinnedCritic<Q>,
    ent_coef: EntCoef,
    buffer: SequenceBuffer,
    history: RunHistory,
    gamma: f64,
    batch_size_sac: usize,
    batch_size_latent: usize,
    log_interval: usize,
    action_fill_value: f32,
    bootstrap_on_truncation: bool,
    learning_steps_latent: usize,
    learning_steps_sac: usize,
    device: candle_core::Device,
}

impl<Q, P> Slac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn validate(config: &SlacConfig<Q, P>) -> Result<()> {
        let b = &config.buffer_config;
        let l = &config.latent_config;
        if b.num_sequences < 2 {
            return Err(SlacError::InvalidConfig(format!(
                "num_sequences must be at least 2, got {}",
                b.num_sequences
            ))
            .into());
        }
        if b.image_shape != l.image_shape
            || b.tactile_dim != l.tactile_dim
            || b.action_dim != l.action_dim
        {
            return Err(SlacError::InvalidConfig(
                "observation or action shapes of the buffer and the latent model differ".into(),
            )
            .into());
        }
        if let Some(policy_config) = &config.actor_config.policy_config {
            if policy_config.get_out_dim() != l.action_dim {
                return Err(SlacError::InvalidConfig(format!(
                    "output of the policy must be {}, got {}",
                    l.action_dim,
                    policy_config.get_out_dim()
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Constructs [`Slac`] agent.
    pub fn build(config: SlacConfig<Q, P>) -> Result<Self> {
        Self::validate(&config)?;
        let device: candle_core::Device = config
            .device
            .unwrap_or(crate::Device::Cpu)
            .try_into()?;

        let ent_coef_mode = config.effective_ent_coef_mode();
        let latent = LatentModel::build(config.latent_config, device.clone())?;
        let actor = GaussianActor::build(config.actor_config, device.clone())?;
        let critic = TwinnedCritic::build(config.critic_config, device.clone())?;
        let ent_coef = EntCoef::new(ent_coef_mode, device.clone())?;
        let buffer = SequenceBuffer::build(&config.buffer_config);
        let history = RunHistory::new(config.history_dir.map(PathBuf::from));

        Ok(Self {
            latent,
            actor,
            critic,
            ent_coef,
            buffer,
            history,
            gamma: config.gamma,
            batch_size_sac: config.batch_size_sac,
            batch_size_latent: config.batch_size_latent,
            log_interval: config.log_interval,
            action_fill_value: config.action_fill_value,
            bootstrap_on_truncation: config.bootstrap_on_truncation,
            learning_steps_latent: 0,
            learning_steps_sac: 0,
            device,
        })
    }

    /// The number of updates of the latent variable model.
    pub fn learning_steps_latent(&self) -> usize {
        self.learning_steps_latent
    }

    /// The number of updates of the actor and the critic.
    pub fn learning_steps_sac(&self) -> usize {
        self.learning_steps_sac
    }

    /// The latent variable model.
    pub fn latent(&self) -> &LatentModel {
        &self.latent
    }

    /// The entropy coefficient.
    pub fn ent_coef(&self) -> &EntCoef {
        &self.ent_coef
    }

    fn should_log(&self, steps: usize) -> bool {
        self.log_interval > 0 && steps % self.log_interval == 0
    }

    /// Encodes the window and concatenates the features with its actions,
    /// `(1, S * F + (S - 1) * A)`.
    fn window_feature_action(&self, window: &ObservationWindow) -> Result<Tensor> {
        let s = window.num_sequences();
        let [c, h, w] = self.buffer.image_shape();
        let image = Tensor::from_vec(window.images(), (1, s, c, h, w), &self.device)?;
        let tactile = Tensor::from_vec(
            window.tactiles(),
            (1, s, self.buffer.tactile_dim()),
            &self.device,
        )?;
        let feature = self.latent.encode(&image, &tactile)?.detach().flatten_from(1)?;
        let action = Tensor::from_vec(
            window.actions(),
            (1, (s - 1) * self.buffer.action_dim()),
            &self.device,
        )?;
        Ok(Tensor::cat(&[feature, action], D::Minus1)?)
    }

    fn prepare_batch(&self, batch: &SacTensors) -> Result<PreparedBatch> {
        let feature = self.latent.encode(&batch.image, &batch.tactile)?.detach();
        let z = self
            .latent
            .sample_posterior(&feature, &batch.action)?
            .z()?
            .detach();
        let s = batch.action.dim(1)?;
        let (feature_action, next_feature_action) = feature_actions(&feature, &batch.action)?;

        Ok(PreparedBatch {
            z: z.i((.., s - 1))?,
            next_z: z.i((.., s))?,
            action: batch.action.i((.., s - 1))?,
            feature_action,
            next_feature_action,
        })
    }

    /// Target of the critic, `r + (1 - terminal) * gamma * (min(q1', q2') - alpha * log_pi')`.
    ///
    /// `reward`, `done` and `mask` are `(B, 1)`. The terminal flag is `done`,
    /// or `mask` if the agent bootstraps on truncation, in which case the
    /// last step of an episode cut by the step limit keeps its next value.
    /// The action at the next step is sampled from the actor and its values
    /// are given by the target critic. The returned `(B, 1)` tensor is detached.
    pub fn critic_target(
        &self,
        reward: &Tensor,
        done: &Tensor,
        mask: &Tensor,
        next_z: &Tensor,
        next_feature_action: &Tensor,
    ) -> Result<Tensor> {
        let terminal = match self.bootstrap_on_truncation {
            true => mask,
            false => done,
        };
        let (next_action, next_log_pi) = self.actor.sample(next_feature_action)?;
        let (q1, q2) = self.critic.qvals_tgt(next_z, &next_action)?;
        let next_q = (q1.minimum(&q2)?
            - self.ent_coef.alpha()?.broadcast_mul(&next_log_pi.detach())?)?;
        let not_terminal = terminal.affine(-1.0, 1.0)?;
        let target = (reward + (not_terminal * next_q)?.affine(self.gamma, 0.0)?)?;
        Ok(target.detach())
    }

    fn update_critic(&mut self, z: &Tensor, action: &Tensor, target: &Tensor) -> Result<f32> {
        let (q1, q2) = self.critic.qvals(z, action)?;
        let loss = (mse(&q1, target)? + mse(&q2, target)?)?;
        self.critic.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    /// Returns `(loss_actor, loss_alpha, entropy)`.
    fn update_actor(&mut self, z: &Tensor, feature_action: &Tensor) -> Result<(f32, f32, f32)> {
        let (action, log_pi) = self.actor.sample(feature_action)?;
        let (q1, q2) = self.critic.qvals(z, &action)?;
        let loss = (self.ent_coef.alpha()?.broadcast_mul(&log_pi)? - q1.minimum(&q2)?)?
            .mean_all()?;
        self.actor.backward_step(&loss)?;

        let (loss_alpha, entropy) = self.ent_coef.update(&log_pi)?;
        Ok((loss.to_scalar::<f32>()?, loss_alpha, entropy))
    }
}

impl<E, Q, P> Agent<E> for Slac<Q, P>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn explore(&mut self, window: &ObservationWindow) -> Result<Vec<f32>> {
        let feature_action = self.window_feature_action(window)?;
        let (action, _) = self.actor.sample(&feature_action)?;
        Ok(action.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn exploit(&mut self, window: &ObservationWindow) -> Result<Vec<f32>> {
        let feature_action = self.window_feature_action(window)?;
        let action = self.actor.exploit(&feature_action)?;
        Ok(action.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn update_latent(&mut self, recorder: &mut dyn Recorder) -> Result<()> {
        self.learning_steps_latent += 1;
        trace!("sample_latent()");
        let batch = self.buffer.sample_latent(self.batch_size_latent)?;
        let batch = SequenceTensors::from_batch(batch, &self.device)?;

        let (loss_kld, loss_image, loss_reward) = self.latent.calculate_loss(
            &batch.image,
            &batch.tactile,
            &batch.action,
            &batch.reward,
            &batch.done,
        )?;
        let loss = ((&loss_kld + &loss_image)? + &loss_reward)?;
        self.latent.backward_step(&loss)?;

        if self.should_log(self.learning_steps_latent) {
            let record = Record::from_slice(&[
                ("loss/kld", RecordValue::Scalar(loss_kld.to_scalar::<f32>()?)),
                ("loss/image", RecordValue::Scalar(loss_image.to_scalar::<f32>()?)),
                ("loss/reward", RecordValue::Scalar(loss_reward.to_scalar::<f32>()?)),
            ]);
            recorder.write(self.learning_steps_latent, record);
        }
        Ok(())
    }

    fn update_sac(&mut self, recorder: &mut dyn Recorder) -> Result<()> {
        self.learning_steps_sac += 1;
        trace!("sample_sac()");
        let batch = self.buffer.sample_sac(self.batch_size_sac)?;
        let batch = SacTensors::from_batch(batch, &self.device)?;
        let prepared = self.prepare_batch(&batch)?;

        trace!("update_critic()");
        let target = self.critic_target(
            &batch.reward,
            &batch.done,
            &batch.mask,
            &prepared.next_z,
            &prepared.next_feature_action,
        )?;
        let loss_critic = self.update_critic(&prepared.z, &prepared.action, &target)?;

        trace!("update_actor()");
        let (loss_actor, loss_alpha, entropy) =
            self.update_actor(&prepared.z, &prepared.feature_action)?;

        trace!("soft_update()");
        self.critic.soft_update()?;

        if self.should_log(self.learning_steps_sac) {
            let record = Record::from_slice(&[
                ("loss/critic", RecordValue::Scalar(loss_critic)),
                ("loss/actor", RecordValue::Scalar(loss_actor)),
                ("loss/alpha", RecordValue::Scalar(loss_alpha)),
                ("stats/alpha", RecordValue::Scalar(self.ent_coef.alpha_scalar()?)),
                ("stats/entropy", RecordValue::Scalar(entropy)),
            ]);
            recorder.write(self.learning_steps_sac, record);
        }
        Ok(())
    }

    fn buffer(&self) -> &SequenceBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut SequenceBuffer {
        &mut self.buffer
    }

    fn history(&self) -> &RunHistory {
        &self.history
    }

    fn history_mut(&mut self) -> &mut RunHistory {
        &mut self.history
    }

    fn action_fill_value(&self) -> f32 {
        self.action_fill_value
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.latent.save_encoder(path.join(ENCODER_FILE))?;
        self.latent.save(path.join(LATENT_FILE))?;
        self.actor.save(path.join(ACTOR_FILE))?;
        self.critic.save(path.join(CRITIC_FILE))?;
        info!("Save SLAC agent to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.latent.load(path.join(LATENT_FILE))?;
        self.latent.load_encoder(path.join(ENCODER_FILE))?;
        self.actor.load(path.join(ACTOR_FILE))?;
        self.critic.load(path.join(CRITIC_FILE))?;
        info!("Load SLAC agent from {:?}", path);
        Ok(())
    }
}
