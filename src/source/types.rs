use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Property naming the parser used for a stream source.
pub const PROP_PARSER: &str = "Parser";
/// Property naming the event stream a stream source reads from.
pub const PROP_EVENT_HUB_NAME: &str = "EventHubName";
/// Property holding the connection string of the stream's lease/checkpoint store.
pub const PROP_STORAGE_CONNECTION_STRING: &str = "StorageConnectionString";

/// A configured diagnostics origin.
///
/// Only the master scheduler mutates a source (`last_scheduled` and
/// `error_message`); everything else comes from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub type_key: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(with = "humantime_serde")]
    pub scheduling_frequency: Duration,
    #[serde(default)]
    pub last_scheduled: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub index_names: BTreeSet<String>,
    #[serde(default)]
    pub mapping_name: Option<String>,
    pub scheduler_type: String,
}

fn default_active() -> bool {
    true
}

impl Source {
    pub fn new(type_key: impl Into<String>, scheduler_type: impl Into<String>) -> Self {
        Self {
            type_key: type_key.into(),
            active: true,
            scheduling_frequency: Duration::from_secs(60),
            last_scheduled: None,
            error_message: None,
            connection_string: String::new(),
            properties: HashMap::new(),
            index_names: BTreeSet::new(),
            mapping_name: None,
            scheduler_type: scheduler_type.into(),
        }
    }

    /// Name of the mapping template, falling back to the type key.
    pub fn mapping_name(&self) -> &str {
        self.mapping_name.as_deref().unwrap_or(&self.type_key)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// A source that has never been scheduled is always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_scheduled else {
            return true;
        };
        match chrono::Duration::from_std(self.scheduling_frequency) {
            Ok(frequency) => last + frequency <= now,
            // A frequency too large for chrono never comes due again.
            Err(_) => false,
        }
    }
}
