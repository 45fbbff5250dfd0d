pub mod store;
pub mod types;

pub use store::{ConfigurationStore, InMemorySourceStore, StoreError};
pub use types::{Source, PROP_EVENT_HUB_NAME, PROP_PARSER, PROP_STORAGE_CONNECTION_STRING};
