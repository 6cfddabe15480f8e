//! Configuration of SLAC agent.
use super::{EntCoefMode, GaussianActorConfig, TwinnedCriticConfig};
use crate::{
    latent::LatentModelConfig,
    model::{SubModel1, SubModel2},
    util::OutDim,
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use slac_core::sequence_buffer::SequenceBufferConfig;
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Learning rate of the entropy coefficient when its mode is not set.
pub const DEFAULT_ALPHA_LR: f64 = 3e-4;

/// Configuration of [`Slac`](super::Slac).
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct SlacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Configuration of the latent variable model.
    pub latent_config: LatentModelConfig,

    /// Configuration of the actor model.
    pub actor_config: GaussianActorConfig<P::Config>,

    /// Configuration of the critic model.
    pub critic_config: TwinnedCriticConfig<Q::Config>,

    /// Configuration of the replay buffer.
    pub buffer_config: SequenceBufferConfig,

    /// How to update entropy coefficient.
    ///
    /// If `None`, alpha is tuned towards the target entropy `-action_dim`.
    pub ent_coef_mode: Option<EntCoefMode>,

    /// Discount factor.
    pub gamma: f64,

    /// Batch size for training the actor and the critic.
    pub batch_size_sac: usize,

    /// Batch size for training the latent variable model.
    pub batch_size_latent: usize,

    /// Losses are recorded every this number of updates.
    pub log_interval: usize,

    /// Value of the extra action slot sent to the environment.
    pub action_fill_value: f32,

    /// If `true`, the critic keeps bootstrapping on episodes truncated by
    /// the step limit.
    pub bootstrap_on_truncation: bool,

    /// Directory of the run history files.
    pub history_dir: Option<String>,

    /// Device for the models.
    pub device: Option<Device>,
}

impl<Q, P> Clone for SlacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            latent_config: self.latent_config.clone(),
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            buffer_config: self.buffer_config.clone(),
            ent_coef_mode: self.ent_coef_mode.clone(),
            gamma: self.gamma,
            batch_size_sac: self.batch_size_sac,
            batch_size_latent: self.batch_size_latent,
            log_interval: self.log_interval,
            action_fill_value: self.action_fill_value,
            bootstrap_on_truncation: self.bootstrap_on_truncation,
            history_dir: self.history_dir.clone(),
            device: self.device,
        }
    }
}

impl<Q, P> Default for SlacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            latent_config: Default::default(),
            actor_config: Default::default(),
            critic_config: Default::default(),
            buffer_config: Default::default(),
            ent_coef_mode: None,
            gamma: 0.99,
            batch_size_sac: 256,
            batch_size_latent: 32,
            log_interval: 1000,
            action_fill_value: -0.3,
            bootstrap_on_truncation: false,
            history_dir: None,
            device: None,
        }
    }
}

impl<Q, P> SlacConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Sets the configuration of the latent variable model.
    pub fn latent_config(mut self, v: LatentModelConfig) -> Self {
        self.latent_config = v;
        self
    }

    /// Sets the configuration of the actor.
    pub fn actor_config(mut self, v: GaussianActorConfig<P::Config>) -> Self {
        self.actor_config = v;
        self
    }

    /// Sets the configuration of the critic.
    pub fn critic_config(mut self, v: TwinnedCriticConfig<Q::Config>) -> Self {
        self.critic_config = v;
        self
    }

    /// Sets the configuration of the replay buffer.
    pub fn buffer_config(mut self, v: SequenceBufferConfig) -> Self {
        self.buffer_config = v;
        self
    }

    /// Sets how to update the entropy coefficient.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = Some(v);
        self
    }

    /// The mode of the entropy coefficient the agent is built with.
    pub fn effective_ent_coef_mode(&self) -> EntCoefMode {
        self.ent_coef_mode.clone().unwrap_or(EntCoefMode::Auto(
            -(self.latent_config.action_dim as f64),
            DEFAULT_ALPHA_LR,
        ))
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Batch size for training the actor and the critic.
    pub fn batch_size_sac(mut self, v: usize) -> Self {
        self.batch_size_sac = v;
        self
    }

    /// Batch size for training the latent variable model.
    pub fn batch_size_latent(mut self, v: usize) -> Self {
        self.batch_size_latent = v;
        self
    }

    /// Interval of recording losses.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Value of the extra action slot sent to the environment.
    pub fn action_fill_value(mut self, v: f32) -> Self {
        self.action_fill_value = v;
        self
    }

    /// Keep bootstrapping on truncated episodes.
    pub fn bootstrap_on_truncation(mut self, v: bool) -> Self {
        self.bootstrap_on_truncation = v;
        self
    }

    /// Directory of the run history files.
    pub fn history_dir(mut self, v: impl Into<String>) -> Self {
        self.history_dir = Some(v.into());
        self
    }

    /// Device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some((&device).into());
        self
    }

    /// Dimension of the input of the actor, `S * F + (S - 1) * A`.
    pub fn feature_action_dim(&self) -> usize {
        let s = self.buffer_config.num_sequences;
        let f = self.latent_config.feature_dim();
        let a = self.latent_config.action_dim;
        s * f + (s - 1) * a
    }

    /// Constructs [`SlacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SLAC agent from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves [`SlacConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SLAC agent into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, Mlp2, MlpConfig};
    use tempdir::TempDir;

    #[test]
    fn test_serde_slac_config() -> Result<()> {
        let config = SlacConfig::<Mlp, Mlp2>::default()
            .actor_config(GaussianActorConfig::default().policy_config(MlpConfig::new(
                10,
                vec![64, 64],
                3,
                false,
            )))
            .critic_config(TwinnedCriticConfig::default().q_config(MlpConfig::new(
                291,
                vec![64, 64],
                1,
                false,
            )))
            .ent_coef_mode(EntCoefMode::Fix(0.1))
            .history_dir("runs")
            .device(candle_core::Device::Cpu);

        let dir = TempDir::new("slac_config")?;
        let path = dir.path().join("slac_config.yaml");
        config.save(&path)?;
        let config_ = SlacConfig::<Mlp, Mlp2>::load(&path)?;
        assert_eq!(config.actor_config, config_.actor_config);
        assert_eq!(config.critic_config, config_.critic_config);
        assert_eq!(config.latent_config, config_.latent_config);
        assert_eq!(config.buffer_config, config_.buffer_config);
        assert_eq!(config.ent_coef_mode, config_.ent_coef_mode);
        assert_eq!(config.history_dir, config_.history_dir);
        assert_eq!(config.device, config_.device);
        Ok(())
    }

    #[test]
    fn test_target_entropy_follows_action_dim() {
        let config = SlacConfig::<Mlp, Mlp2>::default()
            .latent_config(LatentModelConfig::default().action_dim(5));
        assert_eq!(
            config.effective_ent_coef_mode(),
            EntCoefMode::Auto(-5.0, DEFAULT_ALPHA_LR)
        );

        let config = config.ent_coef_mode(EntCoefMode::Fix(0.2));
        assert_eq!(config.effective_ent_coef_mode(), EntCoefMode::Fix(0.2));
    }

    #[test]
    fn test_feature_action_dim() {
        let config = SlacConfig::<Mlp, Mlp2>::default();
        // S = 8, F = 256 + 96, A = 3
        assert_eq!(config.feature_action_dim(), 8 * 352 + 7 * 3);
    }
}
