pub mod multiline;
pub mod record;
pub mod redact;

pub use multiline::{LineLayout, MultiLineParser};
pub use record::{ParsedRecord, RecordError};
pub use redact::{Redactor, REDACTION_MARKER};

use crate::source::Source;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to open log stream: {0}")]
    Open(#[source] io::Error),

    #[error("failed to read log stream: {0}")]
    Read(#[from] io::Error),
}

pub type ByteStream = Box<dyn Read + Send>;

/// Returns a fresh byte stream on every call. Parsing twice means opening twice.
pub type StreamOpener = Arc<dyn Fn() -> io::Result<ByteStream> + Send + Sync>;

/// Lazy sequence of parsed records; nothing is read until it is polled.
pub type RecordStream = Box<dyn Iterator<Item = Result<ParsedRecord, ParserError>> + Send>;

/// Turns a raw log byte stream into structured records.
pub trait LogParser: Send + Sync {
    fn parse(&self, opener: StreamOpener, source_uri: Option<&str>, source: &Source) -> RecordStream;
}

pub fn opener_from_bytes(bytes: impl Into<Arc<[u8]>>) -> StreamOpener {
    let bytes: Arc<[u8]> = bytes.into();
    Arc::new(move || Ok(Box::new(Cursor::new(Arc::clone(&bytes))) as ByteStream))
}

pub fn opener_from_path(path: impl Into<PathBuf>) -> StreamOpener {
    let path = path.into();
    Arc::new(move || Ok(Box::new(File::open(&path)?) as ByteStream))
}

/// Parsers by the name a source selects them with.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, Arc<dyn LogParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `bracketed` and `sitecore` multi-line parsers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("bracketed", Arc::new(MultiLineParser::bracketed()));
        registry.register("sitecore", Arc::new(MultiLineParser::sitecore()));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, parser: Arc<dyn LogParser>) {
        self.parsers.insert(name.into(), parser);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LogParser>> {
        self.parsers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.parsers.keys()).finish()
    }
}
