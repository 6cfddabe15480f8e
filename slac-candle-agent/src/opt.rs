//! Optimizers.
//!
//! All networks of the agent, including the entropy coefficient, are trained
//! with Adam. Only the learning rate differs between the latent variable
//! model and the actor-critic.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::Optimizer as _;
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in the agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
        /// Decay rate of the first moment.
        #[serde(default = "default_beta1")]
        beta1: f64,
        /// Decay rate of the second moment.
        #[serde(default = "default_beta2")]
        beta2: f64,
        /// Term added to the denominator.
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdam::default().beta_1
}

fn default_beta2() -> f64 {
    ParamsAdam::default().beta_2
}

fn default_eps() -> f64 {
    ParamsAdam::default().eps
}

impl OptimizerConfig {
    /// Adam with the given learning rate and default moment parameters.
    pub fn adam(lr: f64) -> Self {
        Self::Adam {
            lr,
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
        }
    }

    /// Constructs an optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match self {
            Self::Adam {
                lr,
                beta1,
                beta2,
                eps,
            } => {
                let params = ParamsAdam {
                    lr: *lr,
                    beta_1: *beta1,
                    beta_2: *beta2,
                    eps: *eps,
                    ..ParamsAdam::default()
                };
                Ok(Optimizer::Adam(Adam::new(vars, params)?))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::Adam {
                beta1, beta2, eps, ..
            } => Self::Adam {
                lr,
                beta1,
                beta2,
                eps,
            },
        }
    }

    /// Learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::Adam { lr, .. } => *lr,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam(3e-4)
    }
}

/// Optimizers.
pub enum Optimizer {
    /// Adam optimizer.
    Adam(Adam),
}

impl Optimizer {
    /// Computes the gradients of the loss and applies an update step
    /// on the variables of the optimizer.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Adam(opt) => Ok(opt.backward_step(loss)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_yaml_without_moments() -> Result<()> {
        let config: OptimizerConfig = serde_yaml::from_str("Adam:\n  lr: 0.001\n")?;
        assert_eq!(config, OptimizerConfig::adam(1e-3));
        assert_eq!(config.learning_rate(1e-4).lr(), 1e-4);
        Ok(())
    }

    #[test]
    fn test_step_decreases_loss() -> Result<()> {
        let x = Var::from_tensor(&Tensor::full(2f32, (3,), &Device::Cpu)?)?;
        let mut opt = OptimizerConfig::adam(1e-1).build(vec![x.clone()])?;
        let loss = |x: &Var| -> Result<f32> {
            Ok(x.as_tensor().sqr()?.sum_all()?.to_scalar::<f32>()?)
        };

        let before = loss(&x)?;
        for _ in 0..5 {
            let l = x.as_tensor().sqr()?.sum_all()?;
            opt.backward_step(&l)?;
        }
        assert!(loss(&x)? < before);
        Ok(())
    }
}
