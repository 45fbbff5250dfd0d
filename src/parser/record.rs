use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

pub const FIELD_TIMESTAMP: &str = "@timestamp";
pub const FIELD_LEVEL: &str = "level";
pub const FIELD_PROCESS_ID: &str = "process_id";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_SOURCE_URI: &str = "source_uri";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has no field '{0}'")]
    MissingField(String),
}

/// One structured log entry: field names to string values, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    fields: Vec<(String, String)>,
}

impl ParsedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing the value in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Result<&str, RecordError> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| RecordError::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn timestamp(&self) -> Result<&str, RecordError> {
        self.get(FIELD_TIMESTAMP)
    }

    pub fn level(&self) -> Result<&str, RecordError> {
        self.get(FIELD_LEVEL)
    }

    pub fn process_id(&self) -> Result<&str, RecordError> {
        self.get(FIELD_PROCESS_ID)
    }

    pub fn message(&self) -> Result<&str, RecordError> {
        self.get(FIELD_MESSAGE)
    }
}

impl Serialize for ParsedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
