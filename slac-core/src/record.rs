//! Types and traits for recording training metrics.
//!
//! The orchestrator and the trainer emit scalar-valued, named, step-indexed
//! observations (losses, the entropy coefficient, evaluation returns).
//! They are collected in a [`Record`] and handed to a [`Recorder`].
//!
//! * [`Record`] - A container of key-value pairs
//! * [`RecordValue`] - The values that can be stored in a [`Record`]
//! * [`Recorder`] - The interface of metrics sinks
//! * [`BufferedRecorder`] - Keeps records in memory
//! * [`NullRecorder`] - Discards all records
//!
//! ```rust
//! use slac_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss/critic", 0.5);
//! record.insert("stats/alpha", RecordValue::Scalar(0.1));
//! assert_eq!(record.get_scalar("loss/critic").unwrap(), 0.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
