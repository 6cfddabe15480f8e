//! Sliding window of the latest observations and actions.
use crate::error::SlacError;
use anyhow::Result;
use std::collections::VecDeque;

/// Keeps the latest `num_sequences` observations and the actions between them.
///
/// The policy acts on this window. At the start of an episode, the slots
/// before the initial observation are filled with zeros.
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    num_sequences: usize,
    image_size: usize,
    tactile_dim: usize,
    action_dim: usize,
    images: VecDeque<Vec<u8>>,
    tactiles: VecDeque<Vec<f32>>,
    actions: VecDeque<Vec<f32>>,
}

impl ObservationWindow {
    /// Creates a window filled with zeros.
    pub fn new(
        num_sequences: usize,
        image_shape: [usize; 3],
        tactile_dim: usize,
        action_dim: usize,
    ) -> Self {
        let image_size = image_shape.iter().product();
        let mut window = Self {
            num_sequences,
            image_size,
            tactile_dim,
            action_dim,
            images: VecDeque::with_capacity(num_sequences),
            tactiles: VecDeque::with_capacity(num_sequences),
            actions: VecDeque::with_capacity(num_sequences),
        };
        window.fill_zeros();
        window
    }

    fn fill_zeros(&mut self) {
        self.images = (0..self.num_sequences)
            .map(|_| vec![0; self.image_size])
            .collect();
        self.tactiles = (0..self.num_sequences)
            .map(|_| vec![0.0; self.tactile_dim])
            .collect();
        self.actions = (0..self.num_sequences.saturating_sub(1))
            .map(|_| vec![0.0; self.action_dim])
            .collect();
    }

    fn check(&self, image: &[u8], tactile: &[f32]) -> Result<()> {
        if image.len() != self.image_size {
            return Err(SlacError::ShapeMismatch {
                what: "image",
                expected: self.image_size,
                actual: image.len(),
            }
            .into());
        }
        if tactile.len() != self.tactile_dim {
            return Err(SlacError::ShapeMismatch {
                what: "tactile",
                expected: self.tactile_dim,
                actual: tactile.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Clears the window and puts the initial observation of an episode.
    pub fn reset_episode(&mut self, image: &[u8], tactile: &[f32]) -> Result<()> {
        self.check(image, tactile)?;
        self.fill_zeros();
        self.images.pop_front();
        self.images.push_back(image.to_vec());
        self.tactiles.pop_front();
        self.tactiles.push_back(tactile.to_vec());
        Ok(())
    }

    /// Slides the window with the action taken and the resulting observation.
    pub fn append(&mut self, image: &[u8], tactile: &[f32], action: &[f32]) -> Result<()> {
        self.check(image, tactile)?;
        if action.len() != self.action_dim {
            return Err(SlacError::ShapeMismatch {
                what: "action",
                expected: self.action_dim,
                actual: action.len(),
            }
            .into());
        }
        self.images.pop_front();
        self.images.push_back(image.to_vec());
        self.tactiles.pop_front();
        self.tactiles.push_back(tactile.to_vec());
        if self.num_sequences > 1 {
            self.actions.pop_front();
            self.actions.push_back(action.to_vec());
        }
        Ok(())
    }

    /// The number of observations in the window.
    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }

    /// Flattened images, `(S, C, H, W)`, oldest first.
    pub fn images(&self) -> Vec<u8> {
        self.images.iter().flatten().copied().collect()
    }

    /// Flattened tactile observations, `(S, T)`, oldest first.
    pub fn tactiles(&self) -> Vec<f32> {
        self.tactiles.iter().flatten().copied().collect()
    }

    /// Flattened actions, `(S - 1, A)`, oldest first.
    pub fn actions(&self) -> Vec<f32> {
        self.actions.iter().flatten().copied().collect()
    }
}
