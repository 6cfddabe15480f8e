//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::{Activation, MlpConfig};
pub use mlp2::Mlp2;

/// Returns linear layers from `in_dim` through `units`, prefixed with `ln{i}`.
fn create_linear_layers(vb: &VarBuilder, in_dim: usize, units: &[usize]) -> Result<Vec<Linear>> {
    let mut layers = Vec::with_capacity(units.len());
    let mut in_dim = in_dim;
    for (i, &out_dim) in units.iter().enumerate() {
        layers.push(linear(in_dim, out_dim, vb.pp(format!("ln{}", i)))?);
        in_dim = out_dim;
    }
    Ok(layers)
}

/// Applies layers with the activation function after each of them.
fn mlp_forward(xs: Tensor, layers: &[Linear], act: &Activation) -> Result<Tensor> {
    let mut xs = xs;
    for layer in layers.iter() {
        xs = act.forward(&layer.forward(&xs)?)?;
    }
    Ok(xs)
}
