#![warn(missing_docs)]
//! Core components of Stochastic Latent Actor-Critic (SLAC).
//!
//! This crate does not depend on any deep learning backend. It provides
//! the environment and agent interfaces, the replay buffer of transition
//! sequences and the training loop.
//!
//! * [`Env`] - Environments with image and tactile observations
//! * [`Agent`] - Trainable agents, with the environment step shared by all of them
//! * [`sequence_buffer::SequenceBuffer`] - Replay buffer sampling windows of episodes
//! * [`window::ObservationWindow`] - The latest observations the policy acts on
//! * [`Trainer`] - The training loop
//! * [`record`] - Metrics and recorders
pub mod dummy;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod record;
pub mod sequence_buffer;
pub mod window;

mod base;
pub use base::{Agent, Env, Observation, Step};

mod trainer;
pub use evaluator::{DefaultEvaluator, Evaluator};
pub use trainer::{Trainer, TrainerConfig};
