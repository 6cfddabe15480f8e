//! Encoder of image and tactile observations.
use super::LatentModelConfig;
use anyhow::Result;
use candle_core::{Module, Tensor, D};
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    ops::leaky_relu,
    sequential::{seq, Sequential},
    VarBuilder,
};

const NEGATIVE_SLOPE: f64 = 0.2;

/// Maps an observation to a feature vector.
///
/// The image feature and the tactile feature are concatenated in this order.
pub struct Encoder {
    image_net: Sequential,
    tactile_net: Sequential,
    image_shape: [usize; 3],
}

impl Encoder {
    fn conv_config(stride: usize, padding: usize) -> Conv2dConfig {
        Conv2dConfig {
            stride,
            padding,
            ..Default::default()
        }
    }

    // (C, 64, 64) -> (out_dim, 1, 1)
    fn create_image_net(vb: &VarBuilder, in_channels: usize, out_dim: usize) -> Result<Sequential> {
        let seq = seq()
            .add(conv2d(in_channels, 32, 5, Self::conv_config(2, 2), vb.pp("c1"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv2d(32, 64, 3, Self::conv_config(2, 1), vb.pp("c2"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv2d(64, 128, 3, Self::conv_config(2, 1), vb.pp("c3"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv2d(128, 256, 3, Self::conv_config(2, 1), vb.pp("c4"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(conv2d(256, out_dim, 4, Self::conv_config(1, 0), vb.pp("c5"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE));

        Ok(seq)
    }

    fn create_tactile_net(vb: &VarBuilder, in_dim: usize, out_dim: usize) -> Result<Sequential> {
        let seq = seq()
            .add(linear(in_dim, out_dim, vb.pp("l1"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE))
            .add(linear(out_dim, out_dim, vb.pp("l2"))?)
            .add_fn(|xs| leaky_relu(xs, NEGATIVE_SLOPE));

        Ok(seq)
    }

    /// Builds the encoder.
    pub fn build(vb: VarBuilder, config: &LatentModelConfig) -> Result<Self> {
        let image_net = Self::create_image_net(
            &vb.pp("image"),
            config.image_shape[0],
            config.img_feature_dim,
        )?;
        let tactile_net = Self::create_tactile_net(
            &vb.pp("tactile"),
            config.tactile_dim,
            config.tactile_feature_dim,
        )?;

        Ok(Self {
            image_net,
            tactile_net,
            image_shape: config.image_shape,
        })
    }

    /// Encodes preprocessed observations.
    ///
    /// `image` is `(B, S, C, H, W)` and `tactile` is `(B, S, T)`.
    /// The output is `(B, S, img_feature_dim + tactile_feature_dim)`.
    pub fn forward(&self, image: &Tensor, tactile: &Tensor) -> Result<Tensor> {
        let (b, s, _, _, _) = image.dims5()?;
        let [c, h, w] = self.image_shape;
        let img = image.reshape((b * s, c, h, w))?;
        let img_feat = self.image_net.forward(&img)?.reshape((b, s, ()))?;

        let t = tactile.dim(D::Minus1)?;
        let tac = tactile.reshape((b * s, t))?;
        let tac_feat = self.tactile_net.forward(&tac)?.reshape((b, s, ()))?;

        Ok(Tensor::cat(&[img_feat, tac_feat], D::Minus1)?)
    }
}
