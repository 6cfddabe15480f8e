//! Decoder reconstructing observations from latent states.
use super::LatentModelConfig;
use anyhow::Result;
use candle_core::{Module, Tensor};
use candle_nn::{
    conv::ConvTranspose2dConfig,
    conv_transpose2d, linear,
    ops::leaky_relu,
    sequential::{seq, Sequential},
    VarBuilder,
};

const NEGATIVE_SLOPE: f64 = 0.2;

/// Fixed standard deviation of reconstructions.
pub const DECODER_STD: f64 = 0.316_227_766_016_837_94; // sqrt(0.1)

/// Maps a latent state `(z1, z2)` to the mean of the image and the tactile
/// observation.
///
/// The standard deviation of both is [`DECODER_STD`].
pub struct Decoder {
    image_net: Sequential,
    tactile_net: Sequential,
    image_shape: [usize; 3],
}

impl Decoder {
    fn convt_config(stride: usize, padding: usize, output_padding: usize) -> ConvTranspose2dConfig {
        ConvTranspose2dConfig {
            padding,
            output_padding,
            stride,
            dilation: 1,
        }
    }

    // (z_dim, 1, 1) -> (C, 64, 64)
    fn create_image_net(vb: &VarBuilder, z_dim: usize, out_channels: usize) -> Result<Sequential> {
        let seq = seq()
            .add(conv_transpose2d(z_dim, 256, 4, Self::convt_config(1, 0, 0), vb.pp("c1"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv_transpose2d(256, 128, 3, Self::convt_config(2, 1, 1), vb.pp("c2"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv_transpose2d(128, 64, 3, Self::convt_config(2, 1, 1), vb.pp("c3"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv_transpose2d(64, 32, 3, Self::convt_config(2, 1, 1), vb.pp("c4"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv_transpose2d(32, out_channels, 5, Self::convt_config(2, 2, 1), vb.pp("c5"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE));

        Ok(seq)
    }

    fn create_tactile_net(vb: &VarBuilder, z_dim: usize, hidden: usize, out_dim: usize) -> Result<Sequential> {
        let seq = seq()
            .add(linear(z_dim, hidden, vb.pp("l1"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(linear(hidden, out_dim, vb.pp("l2"))?);

        Ok(seq)
    }

    /// Builds the decoder.
    pub fn build(vb: VarBuilder, config: &LatentModelConfig) -> Result<Self> {
        let z_dim = config.z_dim();
        let image_net = Self::create_image_net(&vb.pp("image"), z_dim, config.image_shape[0])?;
        let tactile_net = Self::create_tactile_net(
            &vb.pp("tactile"),
            z_dim,
            config.hidden_units[0],
            config.tactile_dim,
        )?;

        Ok(Self {
            image_net,
            tactile_net,
            image_shape: config.image_shape,
        })
    }

    /// Returns the means of the reconstructed image `(B, S, C, H, W)` and
    /// tactile observation `(B, S, T)` given `z` of shape `(B, S, Z)`.
    pub fn forward(&self, z: &Tensor) -> Result<(Tensor, Tensor)> {
        let (b, s, z_dim) = z.dims3()?;
        let [c, h, w] = self.image_shape;

        let image = self
            .image_net
            .forward(&z.reshape((b * s, z_dim, 1, 1))?)?
            .reshape((b, s, c, h, w))?;
        let tactile = self
            .tactile_net
            .forward(&z.reshape((b * s, z_dim))?)?
            .reshape((b, s, ()))?;

        Ok((image, tactile))
    }
}
