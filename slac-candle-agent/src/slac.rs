//! Stochastic latent actor-critic (SLAC) agent.
mod actor;
mod base;
mod config;
mod critic;
mod ent_coef;
pub use actor::{GaussianActor, GaussianActorConfig};
pub use base::Slac;
pub use config::{SlacConfig, DEFAULT_ALPHA_LR};
pub use critic::{TwinnedCritic, TwinnedCriticConfig};
pub use ent_coef::{EntCoef, EntCoefMode};
