//! Base implementation of records for logging.
use crate::error::SlacError;
use std::{
    collections::{
        hash_map::{Iter, Keys},
        HashMap,
    },
    convert::Into,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss.
    Scalar(f32),

    /// A text value.
    String(String),
}

/// A container for storing key-value pairs of various data types.
///
/// # Examples
///
/// ```rust
/// use slac_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("loss/kld", 0.5);
/// record.insert("loss/image", RecordValue::Scalar(120.0));
///
/// let loss = record.get_scalar("loss/kld").unwrap();
/// assert_eq!(loss, 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Gets a scalar value from the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not exist or the value is not a scalar.
    pub fn get_scalar(&self, k: &str) -> Result<f32, SlacError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::Scalar(v) => Ok(*v),
                _ => Err(SlacError::RecordValueTypeError("Scalar".to_string())),
            }
        } else {
            Err(SlacError::RecordKeyError(k.to_string()))
        }
    }

    /// Returns `true` if the record contains no key-value pairs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of key-value pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insert_overwrites_existing_key() {
        let mut r = Record::from_slice(&[
            ("loss/actor", RecordValue::Scalar(1.0)),
            ("stats/alpha", RecordValue::Scalar(0.5)),
        ]);
        r.insert("stats/alpha", RecordValue::Scalar(0.25));

        assert_eq!(r.len(), 2);
        assert_eq!(r.get_scalar("loss/actor").unwrap(), 1.0);
        assert_eq!(r.get_scalar("stats/alpha").unwrap(), 0.25);
    }

    #[test]
    fn test_get_scalar_errors() {
        let mut r = Record::empty();
        r.insert("name", RecordValue::String("slac".into()));

        assert!(matches!(
            r.get_scalar("missing"),
            Err(SlacError::RecordKeyError(_))
        ));
        assert!(matches!(
            r.get_scalar("name"),
            Err(SlacError::RecordValueTypeError(_))
        ));
    }
}
