//! Sequential latent variable model.
//!
//! The model has two latent variables per time step: `z1`, re-sampled every
//! step, and `z2`, computed from `z1`, the previous `z2` and the action.
//! A prior chain uses only actions and a posterior chain also uses features
//! of observations. Both chains share the transition of `z2`.
mod base;
mod config;
mod decoder;
mod encoder;
mod gaussian;
pub use base::{LatentModel, LatentSequence};
pub use config::LatentModelConfig;
pub use decoder::{Decoder, DECODER_STD};
pub use encoder::Encoder;
pub use gaussian::{FixedGaussian, Gaussian};
