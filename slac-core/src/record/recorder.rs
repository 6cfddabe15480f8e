use super::Record;

/// Writes step-indexed records to an output destination.
pub trait Recorder {
    /// Writes a record observed at the given step.
    fn write(&mut self, step: usize, record: Record);

    /// Flushes buffered values to the output destination, if any.
    fn flush(&mut self) {}
}
