//! Twinned action-value functions with their target.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
    util::track,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`TwinnedCritic`].
pub struct TwinnedCriticConfig<Q> {
    /// Configuration of each action-value function.
    pub q_config: Option<Q>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Soft update coefficient of the target.
    pub tau: f64,
}

impl<Q> Default for TwinnedCriticConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::adam(3e-4),
            tau: 5e-3,
        }
    }
}

impl<Q> TwinnedCriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Constructs [`TwinnedCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TwinnedCriticConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Two action-value functions on latent states and actions.
///
/// The target networks have the same variable names as the online networks
/// and are not trained by the optimizer. They only follow the online
/// networks through [`TwinnedCritic::soft_update()`].
pub struct TwinnedCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    varmap: VarMap,
    varmap_tgt: VarMap,
    qnets: [Q; 2],
    qnets_tgt: [Q; 2],
    opt: Optimizer,
    tau: f64,
}

impl<Q> TwinnedCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    fn build_pair(varmap: &VarMap, q_config: &Q::Config, device: &Device) -> Result<[Q; 2]> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
        let q1 = Q::build(vb.pp("critic0"), q_config.clone())?;
        let q2 = Q::build(vb.pp("critic1"), q_config.clone())?;
        Ok([q1, q2])
    }

    /// Constructs [`TwinnedCritic`]. The target is an exact copy.
    pub fn build(config: TwinnedCriticConfig<Q::Config>, device: Device) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let varmap = VarMap::new();
        let varmap_tgt = VarMap::new();
        let qnets = Self::build_pair(&varmap, &q_config, &device)?;
        let qnets_tgt = Self::build_pair(&varmap_tgt, &q_config, &device)?;
        let opt = config.opt_config.build(varmap.all_vars())?;
        track(&varmap_tgt, &varmap, 1.0)?;

        Ok(Self {
            varmap,
            varmap_tgt,
            qnets,
            qnets_tgt,
            opt,
            tau: config.tau,
        })
    }

    /// Action values of the online networks, both `(B, 1)`.
    pub fn qvals(&self, z: &Tensor, action: &Tensor) -> Result<(Tensor, Tensor)> {
        let q1 = self.qnets[0].forward(z, action)?;
        let q2 = self.qnets[1].forward(z, action)?;
        Ok((q1, q2))
    }

    /// Action values of the target networks, both `(B, 1)` and detached.
    pub fn qvals_tgt(&self, z: &Tensor, action: &Tensor) -> Result<(Tensor, Tensor)> {
        let q1 = self.qnets_tgt[0].forward(z, action)?.detach();
        let q2 = self.qnets_tgt[1].forward(z, action)?.detach();
        Ok((q1, q2))
    }

    /// Moves the target towards the online networks by `tau`.
    pub fn soft_update(&mut self) -> Result<()> {
        track(&self.varmap_tgt, &self.varmap, self.tau)
    }

    /// Copies the online networks to the target.
    pub fn sync_target(&mut self) -> Result<()> {
        track(&self.varmap_tgt, &self.varmap, 1.0)
    }

    /// Takes a gradient step on the parameters of the online networks.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variables of the online networks.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Variables of the target networks.
    pub fn varmap_tgt(&self) -> &VarMap {
        &self.varmap_tgt
    }

    /// Saves the parameters of the online networks.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path.as_ref())?;
        info!("Save critic parameters to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters of the online networks and copies them to the target.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        self.sync_target()?;
        info!("Load critic parameters from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use candle_nn::loss::mse;

    fn critic(tau: f64) -> Result<TwinnedCritic<Mlp>> {
        let config = TwinnedCriticConfig::default()
            .q_config(MlpConfig::new(5, vec![8], 1, false))
            .tau(tau);
        TwinnedCritic::build(config, Device::Cpu)
    }

    // Sum of absolute differences between the online and target parameters.
    fn diff(c: &TwinnedCritic<Mlp>) -> Result<f32> {
        let src = c.varmap().data().lock().unwrap();
        let dest = c.varmap_tgt().data().lock().unwrap();
        let mut d = 0f32;
        for (k, v) in src.iter() {
            let t = (v.as_tensor() - dest[k].as_tensor())?;
            d += t.abs()?.sum_all()?.to_scalar::<f32>()?;
        }
        Ok(d)
    }

    #[test]
    fn test_target_follows_online() -> Result<()> {
        let mut critic = critic(0.5)?;
        let z = Tensor::randn(0f32, 1.0, (4, 3), &Device::Cpu)?;
        let a = Tensor::randn(0f32, 1.0, (4, 2), &Device::Cpu)?;

        // Exact copy at construction
        assert_eq!(diff(&critic)?, 0.0);
        let (q1, _) = critic.qvals(&z, &a)?;
        let (t1, _) = critic.qvals_tgt(&z, &a)?;
        assert_eq!(q1.to_vec2::<f32>()?, t1.to_vec2::<f32>()?);

        let target = Tensor::ones((4, 1), DType::F32, &Device::Cpu)?;
        let (q1, q2) = critic.qvals(&z, &a)?;
        let loss = (mse(&q1, &target)? + mse(&q2, &target)?)?;
        critic.backward_step(&loss)?;

        // The optimizer does not touch the target
        let d0 = diff(&critic)?;
        assert!(d0 > 0.0);

        critic.soft_update()?;
        assert!(diff(&critic)? < d0);

        critic.sync_target()?;
        assert_eq!(diff(&critic)?, 0.0);
        Ok(())
    }

    #[test]
    fn test_soft_update_is_exact_for_every_parameter() -> Result<()> {
        let tau = 0.3;
        let mut critic = critic(tau)?;
        let z = Tensor::randn(0f32, 1.0, (4, 3), &Device::Cpu)?;
        let a = Tensor::randn(0f32, 1.0, (4, 2), &Device::Cpu)?;
        let target = Tensor::ones((4, 1), DType::F32, &Device::Cpu)?;
        for _ in 0..3 {
            let (q1, q2) = critic.qvals(&z, &a)?;
            let loss = (mse(&q1, &target)? + mse(&q2, &target)?)?;
            critic.backward_step(&loss)?;
        }

        // Var::set writes in place, so the snapshot must own its storage
        let prev = critic
            .varmap_tgt()
            .data()
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.as_tensor().copy()?)))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(prev.len(), 8);

        critic.soft_update()?;

        let online = critic.varmap().data().lock().unwrap();
        let tgt = critic.varmap_tgt().data().lock().unwrap();
        for (k, t_prev) in prev.iter() {
            let expected = ((tau * online[k].as_tensor())? + (1.0 - tau) * t_prev)?;
            let actual = tgt[k].as_tensor();
            assert_ne!(
                t_prev.flatten_all()?.to_vec1::<f32>()?,
                online[k].as_tensor().flatten_all()?.to_vec1::<f32>()?,
                "{} did not move before the update",
                k
            );
            assert_eq!(
                expected.flatten_all()?.to_vec1::<f32>()?,
                actual.flatten_all()?.to_vec1::<f32>()?,
                "{}",
                k
            );
        }
        Ok(())
    }
}
