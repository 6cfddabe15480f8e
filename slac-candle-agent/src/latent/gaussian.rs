//! Gaussian distributions parameterized by networks.
use crate::util::softplus;
use anyhow::Result;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{linear, ops::leaky_relu, Linear, VarBuilder};

const NEGATIVE_SLOPE: f64 = 0.2;

/// Diagonal Gaussian whose mean and standard deviation are given by an MLP.
///
/// Inputs of any rank are accepted; the last axis is the feature axis.
pub struct Gaussian {
    layers: Vec<Linear>,
    out_dim: usize,
}

impl Gaussian {
    /// Builds the network with the given hidden units.
    pub fn build(vb: VarBuilder, in_dim: usize, out_dim: usize, hidden_units: &[usize]) -> Result<Self> {
        let mut layers = Vec::with_capacity(hidden_units.len() + 1);
        let mut d = in_dim;
        for (i, &units) in hidden_units.iter().enumerate() {
            layers.push(linear(d, units, vb.pp(format!("ln{}", i)))?);
            d = units;
        }
        layers.push(linear(d, 2 * out_dim, vb.pp(format!("ln{}", hidden_units.len())))?);

        Ok(Self { layers, out_dim })
    }

    /// Returns the mean and the standard deviation.
    ///
    /// The standard deviation is `softplus(x) + 1e-5`.
    pub fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let dims = xs.dims().to_vec();
        let in_dim = dims[dims.len() - 1];
        let mut h = xs.reshape((xs.elem_count() / in_dim, in_dim))?;

        let n = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i + 1 < n {
                h = leaky_relu(&h, NEGATIVE_SLOPE)?;
            }
        }

        let mut shape = dims[..dims.len() - 1].to_vec();
        shape.push(self.out_dim);
        let mean = h.narrow(1, 0, self.out_dim)?.reshape(shape.clone())?;
        let std = (softplus(&h.narrow(1, self.out_dim, self.out_dim)?)? + 1e-5)?.reshape(shape)?;
        Ok((mean, std))
    }
}

/// Gaussian with constant parameters, `N(0, std^2 I)`.
pub struct FixedGaussian {
    out_dim: usize,
    std: f64,
}

impl FixedGaussian {
    /// Constructs the distribution.
    pub fn new(out_dim: usize, std: f64) -> Self {
        Self { out_dim, std }
    }

    /// Returns the mean and the standard deviation for a batch.
    pub fn forward(&self, batch_size: usize, device: &Device) -> Result<(Tensor, Tensor)> {
        let mean = Tensor::zeros((batch_size, self.out_dim), DType::F32, device)?;
        let std = Tensor::ones((batch_size, self.out_dim), DType::F32, device)?.affine(self.std, 0.0)?;
        Ok((mean, std))
    }
}

/// Draws a reparameterized sample `mean + std * eps`, `eps ~ N(0, I)`.
pub(super) fn rsample(mean: &Tensor, std: &Tensor) -> Result<Tensor> {
    let eps = std.randn_like(0.0, 1.0)?;
    Ok((mean + (std * eps)?)?)
}
