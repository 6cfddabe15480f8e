//! Core functionalities.
mod agent;
mod env;
mod step;
pub use agent::Agent;
pub use env::Env;
pub use step::{Observation, Step};
