use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Multilayer perceptron.
///
/// As [`SubModel2`], the two inputs are concatenated along the last axis.
/// The critic uses this to take latent states and actions.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
    head: Linear,
}

fn _build(vb: VarBuilder, config: MlpConfig) -> Result<Mlp> {
    let device = vb.device().clone();
    let vb = vb.pp("mlp");
    let layers = create_linear_layers(&vb, config.in_dim, &config.units)?;
    let last = *config
        .units
        .last()
        .context("MlpConfig must have at least one hidden layer")?;
    let head = linear(last, config.out_dim, vb.pp(format!("ln{}", config.units.len())))?;

    Ok(Mlp {
        config,
        device,
        layers,
        head,
    })
}

impl Mlp {
    fn forward_(&self, xs: Tensor) -> Result<Tensor> {
        let xs = mlp_forward(xs, &self.layers, &self.config.activation)?;
        let xs = self.head.forward(&xs)?;

        match self.config.activation_out {
            false => Ok(xs),
            true => self.config.activation.forward(&xs),
        }
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        self.forward_(xs.to_device(&self.device)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vb, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Tensor> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        self.forward_(input)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vb, config)
    }
}
