//! Sequential latent variable model.
use super::{
    decoder::DECODER_STD,
    gaussian::rsample,
    Decoder, Encoder, FixedGaussian, Gaussian, LatentModelConfig,
};
use crate::{
    opt::Optimizer,
    util::{gaussian_kl, gaussian_nll},
};
use anyhow::{anyhow, Result};
use candle_core::{safetensors, DType, Device, IndexOp, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use std::{collections::HashMap, path::Path};

const ENCODER_PREFIX: &str = "encoder.";

/// Latent variables of a sequence of `S + 1` observations.
///
/// All tensors have shape `(B, S + 1, dim)`.
pub struct LatentSequence {
    /// Means of the distributions of `z1`.
    pub z1_mean: Tensor,

    /// Standard deviations of the distributions of `z1`.
    pub z1_std: Tensor,

    /// Samples of `z1`.
    pub z1: Tensor,

    /// Samples of `z2`.
    pub z2: Tensor,
}

impl LatentSequence {
    /// The latent state `(z1, z2)`, `(B, S + 1, z1_dim + z2_dim)`.
    pub fn z(&self) -> Result<Tensor> {
        Ok(Tensor::cat(&[&self.z1, &self.z2], D::Minus1)?)
    }

    fn stack(z1_mean: &[Tensor], z1_std: &[Tensor], z1: &[Tensor], z2: &[Tensor]) -> Result<Self> {
        Ok(Self {
            z1_mean: Tensor::stack(z1_mean, 1)?,
            z1_std: Tensor::stack(z1_std, 1)?,
            z1: Tensor::stack(z1, 1)?,
            z2: Tensor::stack(z2, 1)?,
        })
    }
}

/// Sequential latent variable model with an encoder and a decoder.
///
/// The prior and the posterior share the networks giving `z2` and the
/// distribution of `z1` at the first step of the prior is `N(0, I)`.
pub struct LatentModel {
    config: LatentModelConfig,
    device: Device,
    varmap: VarMap,
    opt: Optimizer,

    encoder: Encoder,
    decoder: Decoder,

    z1_prior_init: FixedGaussian,
    z2_init: Gaussian,
    z1_prior: Gaussian,
    z2: Gaussian,
    z1_posterior_init: Gaussian,
    z1_posterior: Gaussian,
    reward: Gaussian,
}

impl LatentModel {
    /// Constructs the model with randomly initialized parameters.
    pub fn build(config: LatentModelConfig, device: Device) -> Result<Self> {
        config.validate()?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let hidden = &config.hidden_units;
        let (z1_dim, z2_dim) = (config.z1_dim, config.z2_dim);
        let (f_dim, a_dim) = (config.feature_dim(), config.action_dim);

        let encoder = Encoder::build(vb.pp("encoder"), &config)?;
        let decoder = Decoder::build(vb.pp("decoder"), &config)?;
        let z1_prior_init = FixedGaussian::new(z1_dim, 1.0);
        let z2_init = Gaussian::build(vb.pp("z2_init"), z1_dim, z2_dim, hidden)?;
        let z1_prior = Gaussian::build(vb.pp("z1_prior"), z2_dim + a_dim, z1_dim, hidden)?;
        let z2 = Gaussian::build(vb.pp("z2"), z1_dim + z2_dim + a_dim, z2_dim, hidden)?;
        let z1_posterior_init = Gaussian::build(vb.pp("z1_posterior_init"), f_dim, z1_dim, hidden)?;
        let z1_posterior = Gaussian::build(
            vb.pp("z1_posterior"),
            f_dim + z2_dim + a_dim,
            z1_dim,
            hidden,
        )?;
        let reward = Gaussian::build(
            vb.pp("reward"),
            2 * config.z_dim() + a_dim,
            1,
            hidden,
        )?;
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            config,
            device,
            varmap,
            opt,
            encoder,
            decoder,
            z1_prior_init,
            z2_init,
            z1_prior,
            z2,
            z1_posterior_init,
            z1_posterior,
            reward,
        })
    }

    /// The configuration of the model.
    pub fn config(&self) -> &LatentModelConfig {
        &self.config
    }

    /// The device of the parameters.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Converts raw pixels into values in `[0, 1]`.
    pub fn preprocess_image(&self, image: &Tensor) -> Result<Tensor> {
        Ok((image.to_dtype(DType::F32)? / 255.0)?)
    }

    /// Scales raw tactile readings.
    pub fn preprocess_tactile(&self, tactile: &Tensor) -> Result<Tensor> {
        Ok((tactile.to_dtype(DType::F32)? / self.config.tactile_scale)?)
    }

    /// Encodes raw observations, `(B, S, C, H, W)` pixels and `(B, S, T)`
    /// tactile readings, into features of shape `(B, S, F)`.
    pub fn encode(&self, image: &Tensor, tactile: &Tensor) -> Result<Tensor> {
        let image = self.preprocess_image(image)?;
        let tactile = self.preprocess_tactile(tactile)?;
        self.encoder.forward(&image, &tactile)
    }

    /// Rolls out the prior given actions `(B, S, A)`, starting from `N(0, I)`.
    pub fn sample_prior(&self, actions: &Tensor) -> Result<LatentSequence> {
        let (b, s, _) = actions.dims3()?;
        let (mut z1_mean, mut z1_std, mut z1, mut z2) = (vec![], vec![], vec![], vec![]);

        let (m, sd) = self.z1_prior_init.forward(b, &self.device)?;
        let z1_t = rsample(&m, &sd)?;
        let (m2, sd2) = self.z2_init.forward(&z1_t)?;
        let z2_t = rsample(&m2, &sd2)?;
        z1_mean.push(m);
        z1_std.push(sd);
        z1.push(z1_t);
        z2.push(z2_t);

        for t in 1..=s {
            let a = actions.i((.., t - 1))?;
            let (m, sd) = self
                .z1_prior
                .forward(&Tensor::cat(&[&z2[t - 1], &a], D::Minus1)?)?;
            let z1_t = rsample(&m, &sd)?;
            let (m2, sd2) = self
                .z2
                .forward(&Tensor::cat(&[&z1_t, &z2[t - 1], &a], D::Minus1)?)?;
            let z2_t = rsample(&m2, &sd2)?;
            z1_mean.push(m);
            z1_std.push(sd);
            z1.push(z1_t);
            z2.push(z2_t);
        }

        LatentSequence::stack(&z1_mean, &z1_std, &z1, &z2)
    }

    /// Samples latent variables from the posterior given features
    /// `(B, S + 1, F)` and actions `(B, S, A)`.
    pub fn sample_posterior(&self, features: &Tensor, actions: &Tensor) -> Result<LatentSequence> {
        let s = actions.dim(1)?;
        let (mut z1_mean, mut z1_std, mut z1, mut z2) = (vec![], vec![], vec![], vec![]);

        let (m, sd) = self.z1_posterior_init.forward(&features.i((.., 0))?)?;
        let z1_t = rsample(&m, &sd)?;
        let (m2, sd2) = self.z2_init.forward(&z1_t)?;
        let z2_t = rsample(&m2, &sd2)?;
        z1_mean.push(m);
        z1_std.push(sd);
        z1.push(z1_t);
        z2.push(z2_t);

        for t in 1..=s {
            let a = actions.i((.., t - 1))?;
            let f = features.i((.., t))?;
            let (m, sd) = self
                .z1_posterior
                .forward(&Tensor::cat(&[&f, &z2[t - 1], &a], D::Minus1)?)?;
            let z1_t = rsample(&m, &sd)?;
            let (m2, sd2) = self
                .z2
                .forward(&Tensor::cat(&[&z1_t, &z2[t - 1], &a], D::Minus1)?)?;
            let z2_t = rsample(&m2, &sd2)?;
            z1_mean.push(m);
            z1_std.push(sd);
            z1.push(z1_t);
            z2.push(z2_t);
        }

        LatentSequence::stack(&z1_mean, &z1_std, &z1, &z2)
    }

    /// Distributions of `z1` under the prior, each conditioned on `z2` of
    /// the previous step taken from the posterior.
    ///
    /// `actions` is `(B, S, A)` and `z2_post` is `(B, S + 1, z2_dim)`.
    /// Returns the mean and the standard deviation, `(B, S + 1, z1_dim)`.
    pub fn prior_conditioned(&self, actions: &Tensor, z2_post: &Tensor) -> Result<(Tensor, Tensor)> {
        let (b, s, _) = actions.dims3()?;
        let (m0, sd0) = self.z1_prior_init.forward(b, &self.device)?;
        let xs = Tensor::cat(&[&z2_post.narrow(1, 0, s)?, actions], D::Minus1)?;
        let (m, sd) = self.z1_prior.forward(&xs)?;
        let mean = Tensor::cat(&[&m0.unsqueeze(1)?, &m], 1)?;
        let std = Tensor::cat(&[&sd0.unsqueeze(1)?, &sd], 1)?;
        Ok((mean, std))
    }

    /// Computes the loss terms `(loss_kld, loss_image, loss_reward)` on a
    /// batch of sequences.
    ///
    /// Observations are raw, `(B, S + 1, C, H, W)` and `(B, S + 1, T)`.
    /// `action` is `(B, S, A)`, `reward` and `done` are `(B, S, 1)`. Each term
    /// is summed over time and dimensions and averaged over the batch.
    pub fn calculate_loss(
        &self,
        image: &Tensor,
        tactile: &Tensor,
        action: &Tensor,
        reward: &Tensor,
        done: &Tensor,
    ) -> Result<(Tensor, Tensor, Tensor)> {
        let feature = self.encode(image, tactile)?;
        let post = self.sample_posterior(&feature, action)?;
        let (pri_mean, pri_std) = self.prior_conditioned(action, &post.z2)?;

        let loss_kld = gaussian_kl(&post.z1_mean, &post.z1_std, &pri_mean, &pri_std)?
            .mean(0)?
            .sum_all()?;

        // Reconstruction
        let z = post.z()?;
        let (image_mean, tactile_mean) = self.decoder.forward(&z)?;
        let image_std = image_mean.ones_like()?.affine(DECODER_STD, 0.0)?;
        let tactile_std = tactile_mean.ones_like()?.affine(DECODER_STD, 0.0)?;
        let nll_image = gaussian_nll(&self.preprocess_image(image)?, &image_mean, &image_std)?
            .mean(0)?
            .sum_all()?;
        let nll_tactile =
            gaussian_nll(&self.preprocess_tactile(tactile)?, &tactile_mean, &tactile_std)?
                .mean(0)?
                .sum_all()?;
        let loss_image = (nll_image + nll_tactile)?;

        // Reward of each transition, ignored after the end of episodes
        let s = action.dim(1)?;
        let x = Tensor::cat(&[&z.narrow(1, 0, s)?, action, &z.narrow(1, 1, s)?], D::Minus1)?;
        let (reward_mean, reward_std) = self.reward.forward(&x)?;
        let not_done = done.affine(-1.0, 1.0)?;
        let loss_reward = (gaussian_nll(reward, &reward_mean, &reward_std)? * not_done)?
            .mean(0)?
            .sum_all()?;

        Ok((loss_kld, loss_image, loss_reward))
    }

    /// Takes a gradient step on all parameters of the model.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Saves all parameters.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path.as_ref())?;
        info!("Save latent model parameters to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads all parameters.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        info!("Load latent model parameters from {:?}", path.as_ref());
        Ok(())
    }

    /// Saves the parameters of the encoder.
    pub fn save_encoder(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("The lock of the VarMap is poisoned"))?;
        let tensors: HashMap<String, Tensor> = data
            .iter()
            .filter(|(k, _)| k.starts_with(ENCODER_PREFIX))
            .map(|(k, v)| (k.clone(), v.as_tensor().clone()))
            .collect();
        safetensors::save(&tensors, path.as_ref())?;
        info!("Save encoder parameters to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters of the encoder.
    pub fn load_encoder(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let tensors = safetensors::load(path.as_ref(), &self.device)?;
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("The lock of the VarMap is poisoned"))?;
        for (k, v) in data.iter().filter(|(k, _)| k.starts_with(ENCODER_PREFIX)) {
            let t = tensors
                .get(k)
                .ok_or_else(|| anyhow!("Variable {} is not found in {:?}", k, path.as_ref()))?;
            v.set(t)?;
        }
        info!("Load encoder parameters from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const B: usize = 2;
    const S: usize = 3;

    fn config() -> LatentModelConfig {
        LatentModelConfig::default()
            .image_shape([1, 64, 64])
            .tactile_dim(2)
            .action_dim(2)
            .img_feature_dim(8)
            .tactile_feature_dim(4)
            .z1_dim(4)
            .z2_dim(6)
            .hidden_units(vec![16])
    }

    fn inputs() -> Result<(Tensor, Tensor, Tensor, Tensor)> {
        let dev = Device::Cpu;
        let image = Tensor::rand(0f32, 255.0, (B, S + 1, 1, 64, 64), &dev)?.to_dtype(DType::U8)?;
        let tactile = Tensor::randn(0f32, 1000.0, (B, S + 1, 2), &dev)?;
        let action = Tensor::rand(-1f32, 1.0, (B, S, 2), &dev)?;
        let reward = Tensor::randn(0f32, 1.0, (B, S, 1), &dev)?;
        Ok((image, tactile, action, reward))
    }

    #[test]
    fn test_shapes() -> Result<()> {
        let model = LatentModel::build(config(), Device::Cpu)?;
        let (image, tactile, action, _) = inputs()?;

        let feature = model.encode(&image, &tactile)?;
        assert_eq!(feature.dims(), &[B, S + 1, 12]);

        let post = model.sample_posterior(&feature, &action)?;
        assert_eq!(post.z1_mean.dims(), &[B, S + 1, 4]);
        assert_eq!(post.z2.dims(), &[B, S + 1, 6]);
        assert_eq!(post.z()?.dims(), &[B, S + 1, 10]);

        let prior = model.sample_prior(&action)?;
        assert_eq!(prior.z1.dims(), &[B, S + 1, 4]);
        assert_eq!(prior.z2.dims(), &[B, S + 1, 6]);

        let (mean, std) = model.prior_conditioned(&action, &post.z2)?;
        assert_eq!(mean.dims(), &[B, S + 1, 4]);
        assert_eq!(std.dims(), &[B, S + 1, 4]);
        Ok(())
    }

    #[test]
    fn test_encode_is_deterministic() -> Result<()> {
        let model = LatentModel::build(config(), Device::Cpu)?;
        let (image, tactile, _, _) = inputs()?;
        let f1 = model.encode(&image, &tactile)?.flatten_all()?.to_vec1::<f32>()?;
        let f2 = model.encode(&image, &tactile)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(f1, f2);
        Ok(())
    }

    #[test]
    fn test_loss_terms() -> Result<()> {
        let mut model = LatentModel::build(config(), Device::Cpu)?;
        let (image, tactile, action, reward) = inputs()?;
        let done = Tensor::zeros((B, S, 1), DType::F32, &Device::Cpu)?;

        let (kld, img, rwd) = model.calculate_loss(&image, &tactile, &action, &reward, &done)?;
        assert_eq!(kld.rank(), 0);
        assert!(kld.to_scalar::<f32>()? >= 0.0);
        assert!(img.to_scalar::<f32>()?.is_finite());
        assert!(rwd.to_scalar::<f32>()?.is_finite());

        let loss = ((kld + img)? + rwd)?;
        model.backward_step(&loss)?;

        // Rewards after the end of episodes are ignored
        let done = Tensor::ones((B, S, 1), DType::F32, &Device::Cpu)?;
        let (_, _, rwd) = model.calculate_loss(&image, &tactile, &action, &reward, &done)?;
        assert_eq!(rwd.to_scalar::<f32>()?, 0.0);
        Ok(())
    }

    #[test]
    fn test_save_and_load_encoder() -> Result<()> {
        let dir = TempDir::new("latent")?;
        let path = dir.path().join("encoder.safetensors");
        let model1 = LatentModel::build(config(), Device::Cpu)?;
        let mut model2 = LatentModel::build(config(), Device::Cpu)?;
        let (image, tactile, _, _) = inputs()?;

        model1.save_encoder(&path)?;
        model2.load_encoder(&path)?;

        let f1 = model1.encode(&image, &tactile)?.flatten_all()?.to_vec1::<f32>()?;
        let f2 = model2.encode(&image, &tactile)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(f1, f2);
        Ok(())
    }

    #[test]
    fn test_rejects_image_size() {
        let config = config().image_shape([3, 32, 32]);
        assert!(LatentModel::build(config, Device::Cpu).is_err());
    }
}
