//! Stochastic latent actor-critic (SLAC) for control from image and tactile
//! observations.
//!
//! The workspace consists of the following crates:
//!
//! * [slac-core](slac_core) provides the replay buffer of sequences, the
//!   observation window, the interfaces of environments and agents, the
//!   trainer and the evaluator. It does not depend on a deep learning backend.
//! * [slac-candle-agent](slac_candle_agent) implements the latent variable
//!   model, the actor, the critic and the agent with
//!   [candle](https://crates.io/crates/candle-core).
//! * [slac-tensorboard](slac_tensorboard) has `TensorboardRecorder` to write
//!   records which can be shown in TensorBoard. It is based on
//!   [tensorboard-rs](https://crates.io/crates/tensorboard-rs).
//!
//! This crate re-exports them and hosts the examples.
pub use slac_candle_agent;
pub use slac_core;
pub use slac_tensorboard;
