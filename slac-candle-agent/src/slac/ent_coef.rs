//! Entropy coefficient.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};

/// Mode of the entropy coefficient.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EntCoefMode {
    /// Use a constant as alpha.
    Fix(f64),
    /// Automatic tuning given `(target_entropy, learning_rate)`.
    Auto(f64, f64),
}

/// The entropy coefficient `alpha = exp(log_alpha)`.
///
/// `log_alpha` is not part of the checkpoints; a loaded agent starts again
/// from the initial value of the mode.
pub struct EntCoef {
    log_alpha: Tensor,
    target_entropy: Option<f64>,
    opt: Option<Optimizer>,
}

impl EntCoef {
    /// Constructs an instance of `EntCoef`.
    pub fn new(mode: EntCoefMode, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let (log_alpha, target_entropy, opt) = match mode {
            EntCoefMode::Fix(alpha) => {
                let init = Init::Const(alpha.ln());
                let log_alpha = vb.get_with_hints(1, "log_alpha", init)?;
                (log_alpha, None, None)
            }
            EntCoefMode::Auto(target_entropy, learning_rate) => {
                let init = Init::Const(0.0);
                let log_alpha = vb.get_with_hints(1, "log_alpha", init)?;
                let opt = OptimizerConfig::default()
                    .learning_rate(learning_rate)
                    .build(varmap.all_vars())?;
                (log_alpha, Some(target_entropy), Some(opt))
            }
        };

        Ok(Self {
            log_alpha,
            opt,
            target_entropy,
        })
    }

    /// Returns the entropy coefficient, `(1,)` and detached.
    pub fn alpha(&self) -> Result<Tensor> {
        Ok(self.log_alpha.detach().exp()?)
    }

    /// The target entropy, `None` with a fixed alpha.
    pub fn target_entropy(&self) -> Option<f64> {
        self.target_entropy
    }

    /// Returns the entropy coefficient as a scalar.
    pub fn alpha_scalar(&self) -> Result<f32> {
        Ok(self.alpha()?.to_vec1::<f32>()?[0])
    }

    /// Updates `log_alpha` given log probabilities of sampled actions.
    ///
    /// Returns `(alpha_loss, entropy)`. The loss is `0` with a fixed alpha.
    pub fn update(&mut self, log_pi: &Tensor) -> Result<(f32, f32)> {
        let entropy = -log_pi.detach().mean_all()?.to_scalar::<f32>()?;
        match (&self.target_entropy, &mut self.opt) {
            (Some(target_entropy), Some(opt)) => {
                let coef = target_entropy - entropy as f64;
                let loss = (&self.log_alpha * -coef)?.sum_all()?;
                opt.backward_step(&loss)?;
                Ok((loss.to_scalar::<f32>()?, entropy))
            }
            _ => Ok((0.0, entropy)),
        }
    }
}
