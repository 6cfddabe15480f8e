use super::{Record, Recorder};

/// Buffered recorder.
///
/// Keeps every written record in memory together with its step.
/// Used for inspecting the metrics emitted during short runs.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<(usize, Record)>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self { buf: Vec::default() }
    }

    /// Returns an iterator over the steps and records.
    pub fn iter(&self) -> std::slice::Iter<(usize, Record)> {
        self.buf.iter()
    }

    /// Returns the steps at which a value with the given key was written.
    pub fn steps_of(&self, key: &str) -> Vec<usize> {
        self.buf
            .iter()
            .filter(|(_, record)| record.get(key).is_some())
            .map(|(step, _)| *step)
            .collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if no record was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Recorder for BufferedRecorder {
    /// Pushes a [`Record`] to the buffer.
    fn write(&mut self, step: usize, record: Record) {
        self.buf.push((step, record));
    }
}
