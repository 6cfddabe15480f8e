//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum SlacError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The sequence buffer does not hold any complete window yet.
    #[error("No window of {required} transitions is available in the buffer ({len} live transitions)")]
    WarmUp {
        /// Number of transitions a window needs.
        required: usize,
        /// Number of live transitions in the buffer.
        len: usize,
    },

    /// A transition was appended before an episode was opened with `reset_episode()`.
    #[error("No open episode; call reset_episode() before appending transitions")]
    NoOpenEpisode,

    /// The length of a given vector does not match the configured shape.
    #[error("Shape mismatch of {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Name of the mismatched item.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Given length.
        actual: usize,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
