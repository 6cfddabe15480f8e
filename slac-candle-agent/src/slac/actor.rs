//! Actor with squashed Gaussian policy.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`GaussianActor`].
pub struct GaussianActorConfig<P: OutDim> {
    /// Configuration of the policy network.
    pub policy_config: Option<P>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Lower bound of log std.
    pub min_log_std: f64,

    /// Upper bound of log std.
    pub max_log_std: f64,
}

impl<P: OutDim> Default for GaussianActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::adam(3e-4),
            min_log_std: -20.0,
            max_log_std: 2.0,
        }
    }
}

impl<P> GaussianActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the minimum value of log std.
    pub fn min_log_std(mut self, v: f64) -> Self {
        self.min_log_std = v;
        self
    }

    /// Sets the maximum value of log std.
    pub fn max_log_std(mut self, v: f64) -> Self {
        self.max_log_std = v;
        self
    }

    /// Sets configurations for policy function.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Loads [`GaussianActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GaussianActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Actor with a Gaussian policy squashed by `tanh`.
///
/// The input is a window of features and actions built by
/// [`feature_actions`](crate::util::feature_actions).
pub struct GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: usize,

    policy: P,
    opt: Optimizer,

    // Min/max log std
    min_log_std: f64,
    max_log_std: f64,
}

impl<P> GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`GaussianActor`].
    pub fn build(config: GaussianActorConfig<P::Config>, device: Device) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let out_dim = policy_config.get_out_dim();
        let varmap = VarMap::new();
        let policy = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("actor");
            P::build(vb, policy_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            out_dim,
            policy,
            opt,
            min_log_std: config.min_log_std,
            max_log_std: config.max_log_std,
        })
    }

    /// Dimension of actions.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Returns the mean and the clamped log std, both `(B, A)`.
    fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.policy.forward(xs)?;
        debug_assert_eq!(mean.dims()[1], self.out_dim);
        let log_std = log_std.clamp(self.min_log_std, self.max_log_std)?;
        Ok((mean, log_std))
    }

    /// Samples actions with the reparameterization trick.
    ///
    /// Returns actions `(B, A)` in `(-1, 1)` and their log densities `(B, 1)`
    /// under the `tanh` transform.
    pub fn sample(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.forward(xs)?;
        let eps = mean.randn_like(0.0, 1.0)?;
        let action = (&mean + (log_std.exp()? * &eps)?)?.tanh()?;

        let log_2pi = (2.0 * std::f64::consts::PI).ln();
        let gaussian_logp = ((-0.5 * eps.sqr()?)? - &log_std)?
            .sum_keepdim(D::Minus1)?
            .affine(1.0, -0.5 * log_2pi * self.out_dim as f64)?;
        let log_jacobian = (1.0 - action.sqr()?)?
            .affine(1.0, 1e-6)?
            .log()?
            .sum_keepdim(D::Minus1)?;
        let log_pi = (gaussian_logp - log_jacobian)?;

        Ok((action, log_pi))
    }

    /// Returns the deterministic action `tanh(mean)`, `(B, A)`.
    pub fn exploit(&self, xs: &Tensor) -> Result<Tensor> {
        let (mean, _) = self.forward(xs)?;
        Ok(mean.tanh()?)
    }

    /// Takes a gradient step on the parameters of the policy.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Saves the parameters.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path.as_ref())?;
        info!("Save actor parameters to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        info!("Load actor parameters from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp2, MlpConfig};

    fn actor() -> Result<GaussianActor<Mlp2>> {
        let config = GaussianActorConfig::default().policy_config(MlpConfig::new(5, vec![16], 2, false));
        GaussianActor::build(config, Device::Cpu)
    }

    #[test]
    fn test_sample_is_bounded() -> Result<()> {
        let actor = actor()?;
        let xs = Tensor::randn(0f32, 100.0, (64, 5), &Device::Cpu)?;
        let (action, log_pi) = actor.sample(&xs)?;
        assert_eq!(action.dims(), &[64, 2]);
        assert_eq!(log_pi.dims(), &[64, 1]);
        assert!(action.abs()?.max_all()?.to_scalar::<f32>()? <= 1.0);
        assert!(log_pi.sum_all()?.to_scalar::<f32>()?.is_finite());

        let action = actor.exploit(&xs)?;
        assert!(action.abs()?.max_all()?.to_scalar::<f32>()? <= 1.0);
        Ok(())
    }

    #[test]
    fn test_exploit_is_deterministic() -> Result<()> {
        let actor = actor()?;
        let xs = Tensor::randn(0f32, 1.0, (3, 5), &Device::Cpu)?;
        let a1 = actor.exploit(&xs)?.flatten_all()?.to_vec1::<f32>()?;
        let a2 = actor.exploit(&xs)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(a1, a2);
        Ok(())
    }
}
