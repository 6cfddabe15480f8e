//! Replay buffer of fixed-length transition sequences.
//!
//! [`SequenceBuffer`] stores per-step transitions in a circular storage and
//! keeps track of the episode each transition belongs to. Batches are drawn as
//! windows of `num_sequences` consecutive transitions of a single episode,
//! together with the observation preceding the first transition of the window.
//!
//! ```rust
//! use slac_core::sequence_buffer::{SequenceBuffer, SequenceBufferConfig};
//!
//! let config = SequenceBufferConfig::default()
//!     .capacity(100)
//!     .num_sequences(2)
//!     .image_shape([1, 2, 2])
//!     .tactile_dim(1)
//!     .action_dim(1);
//! let mut buffer = SequenceBuffer::build(&config);
//!
//! buffer.reset_episode(&[0; 4], &[0.0]).unwrap();
//! buffer.append(&[0.1], 1.0, false, &[1; 4], &[1.0], false).unwrap();
//! assert!(!buffer.is_ready());
//! buffer.append(&[0.2], 1.0, false, &[2; 4], &[2.0], false).unwrap();
//! assert!(buffer.is_ready());
//!
//! let batch = buffer.sample_latent(4).unwrap();
//! assert_eq!(batch.image.len(), 4 * 3 * 4);
//! ```
mod base;
mod batch;
mod config;
pub use base::SequenceBuffer;
pub use batch::{SacBatch, SequenceBatch};
pub use config::SequenceBufferConfig;
