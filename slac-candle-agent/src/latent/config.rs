//! Configuration of [`LatentModel`](super::LatentModel).
use crate::opt::OptimizerConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use slac_core::error::SlacError;
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`LatentModel`](super::LatentModel).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LatentModelConfig {
    /// Shape of image observations, `[channels, height, width]`.
    ///
    /// The convolutional encoder and decoder work on `64x64` images.
    pub image_shape: [usize; 3],

    /// Length of tactile observations.
    pub tactile_dim: usize,

    /// Dimension of actions.
    pub action_dim: usize,

    /// Dimension of image features.
    pub img_feature_dim: usize,

    /// Dimension of tactile features.
    pub tactile_feature_dim: usize,

    /// Dimension of `z1`.
    pub z1_dim: usize,

    /// Dimension of `z2`.
    pub z2_dim: usize,

    /// Hidden units of Gaussian heads.
    pub hidden_units: Vec<usize>,

    /// Raw tactile readings are divided by this value.
    pub tactile_scale: f64,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl Default for LatentModelConfig {
    fn default() -> Self {
        Self {
            image_shape: [3, 64, 64],
            tactile_dim: 6,
            action_dim: 3,
            img_feature_dim: 256,
            tactile_feature_dim: 96,
            z1_dim: 32,
            z2_dim: 256,
            hidden_units: vec![256, 256],
            tactile_scale: 1000.0,
            opt_config: OptimizerConfig::adam(1e-4),
        }
    }
}

impl LatentModelConfig {
    /// Sets the shape of image observations.
    pub fn image_shape(mut self, v: [usize; 3]) -> Self {
        self.image_shape = v;
        self
    }

    /// Sets the length of tactile observations.
    pub fn tactile_dim(mut self, v: usize) -> Self {
        self.tactile_dim = v;
        self
    }

    /// Sets the dimension of actions.
    pub fn action_dim(mut self, v: usize) -> Self {
        self.action_dim = v;
        self
    }

    /// Sets the dimension of image features.
    pub fn img_feature_dim(mut self, v: usize) -> Self {
        self.img_feature_dim = v;
        self
    }

    /// Sets the dimension of tactile features.
    pub fn tactile_feature_dim(mut self, v: usize) -> Self {
        self.tactile_feature_dim = v;
        self
    }

    /// Sets the dimension of `z1`.
    pub fn z1_dim(mut self, v: usize) -> Self {
        self.z1_dim = v;
        self
    }

    /// Sets the dimension of `z2`.
    pub fn z2_dim(mut self, v: usize) -> Self {
        self.z2_dim = v;
        self
    }

    /// Sets the hidden units of Gaussian heads.
    pub fn hidden_units(mut self, v: Vec<usize>) -> Self {
        self.hidden_units = v;
        self
    }

    /// Sets the scale of tactile readings.
    pub fn tactile_scale(mut self, v: f64) -> Self {
        self.tactile_scale = v;
        self
    }

    /// Sets the configuration of the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Dimension of the feature of an observation.
    pub fn feature_dim(&self) -> usize {
        self.img_feature_dim + self.tactile_feature_dim
    }

    /// Dimension of the latent state `(z1, z2)`.
    pub fn z_dim(&self) -> usize {
        self.z1_dim + self.z2_dim
    }

    /// Checks the configuration can build a model.
    pub fn validate(&self) -> Result<()> {
        let [_, h, w] = self.image_shape;
        if h != 64 || w != 64 {
            return Err(SlacError::InvalidConfig(format!(
                "image must be 64x64, got {}x{}",
                h, w
            ))
            .into());
        }
        if self.hidden_units.is_empty() {
            return Err(SlacError::InvalidConfig("hidden_units is empty".into()).into());
        }
        Ok(())
    }

    /// Constructs [`LatentModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`LatentModelConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
