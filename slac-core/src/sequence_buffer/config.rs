//! Configuration of [`SequenceBuffer`](super::SequenceBuffer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SequenceBuffer`](super::SequenceBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SequenceBufferConfig {
    /// The maximum number of live transitions.
    pub capacity: usize,

    /// The number of transitions in a window.
    pub num_sequences: usize,

    /// Shape of image observations, `[channels, height, width]`.
    pub image_shape: [usize; 3],

    /// Length of tactile observations.
    pub tactile_dim: usize,

    /// Dimension of actions stored in the buffer.
    pub action_dim: usize,

    /// Random seed for sampling windows.
    pub seed: u64,
}

impl Default for SequenceBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            num_sequences: 8,
            image_shape: [3, 64, 64],
            tactile_dim: 6,
            action_dim: 3,
            seed: 42,
        }
    }
}

impl SequenceBufferConfig {
    /// Sets the capacity of the buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of transitions in a window.
    pub fn num_sequences(mut self, num_sequences: usize) -> Self {
        self.num_sequences = num_sequences;
        self
    }

    /// Sets the shape of image observations.
    pub fn image_shape(mut self, image_shape: [usize; 3]) -> Self {
        self.image_shape = image_shape;
        self
    }

    /// Sets the length of tactile observations.
    pub fn tactile_dim(mut self, tactile_dim: usize) -> Self {
        self.tactile_dim = tactile_dim;
        self
    }

    /// Sets the dimension of actions.
    pub fn action_dim(mut self, action_dim: usize) -> Self {
        self.action_dim = action_dim;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The number of pixels of an image observation.
    pub fn image_size(&self) -> usize {
        self.image_shape.iter().product()
    }

    /// Constructs [`SequenceBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`SequenceBufferConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
