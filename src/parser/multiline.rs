use super::record::{
    ParsedRecord, FIELD_LEVEL, FIELD_MESSAGE, FIELD_PROCESS_ID, FIELD_SOURCE_URI,
    FIELD_TIMESTAMP,
};
use super::redact::Redactor;
use super::{ByteStream, LogParser, ParserError, RecordStream, StreamOpener};
use crate::source::Source;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::io::{BufRead, BufReader};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

const LEVELS: &str = "TRACE|DEBUG|INFO|WARNING|WARN|ERROR|FATAL";

/// Shape of the line that opens a new record.
///
/// The pattern must define the named groups `ts`, `pid` and `level`; `msg`
/// is optional and holds the first line of the message body.
#[derive(Debug)]
pub struct LineLayout {
    name: String,
    pattern: Regex,
    date_from_uri: bool,
}

impl LineLayout {
    pub fn new(name: impl Into<String>, pattern: Regex, date_from_uri: bool) -> Self {
        Self {
            name: name.into(),
            pattern,
            date_from_uri,
        }
    }

    /// `[<timestamp>] [<process id>] <LEVEL> <message>`
    pub fn bracketed() -> Self {
        let pattern = Regex::new(&format!(
            r"^\[(?P<ts>[^\]]+)\]\s+\[(?P<pid>[^\]]+)\]\s+(?P<level>{})(?:\s+(?P<msg>.*))?$",
            LEVELS
        ))
        .expect("bracketed layout is valid regex");
        Self::new("bracketed", pattern, false)
    }

    /// Sitecore's native layout, `<process id> <HH:MM:SS> <LEVEL> <message>`.
    /// The date lives in the log file name, so it is taken from the source URI.
    pub fn sitecore() -> Self {
        let pattern = Regex::new(&format!(
            r"^(?P<pid>\S.*?)\s+(?P<ts>\d{{2}}:\d{{2}}:\d{{2}})\s+(?P<level>{})(?:\s+(?P<msg>.*))?$",
            LEVELS
        ))
        .expect("sitecore layout is valid regex");
        Self::new("sitecore", pattern, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Multi-line, severity-tagged log parser. A header line starts a record and
/// every following line up to the next header belongs to its message.
#[derive(Debug, Clone)]
pub struct MultiLineParser {
    layout: Arc<LineLayout>,
    redactor: Arc<Redactor>,
}

impl MultiLineParser {
    pub fn new(layout: LineLayout, redactor: Redactor) -> Self {
        Self {
            layout: Arc::new(layout),
            redactor: Arc::new(redactor),
        }
    }

    pub fn bracketed() -> Self {
        Self::new(LineLayout::bracketed(), Redactor::new())
    }

    pub fn sitecore() -> Self {
        Self::new(LineLayout::sitecore(), Redactor::new())
    }

    pub fn layout_name(&self) -> &str {
        self.layout.name()
    }
}

impl LogParser for MultiLineParser {
    fn parse(&self, opener: StreamOpener, source_uri: Option<&str>, _source: &Source) -> RecordStream {
        let uri_date = if self.layout.date_from_uri {
            source_uri.and_then(date_from_uri)
        } else {
            None
        };

        Box::new(MultiLineRecords {
            layout: Arc::clone(&self.layout),
            redactor: Arc::clone(&self.redactor),
            opener,
            source_uri: source_uri.map(str::to_string),
            uri_date,
            reader: None,
            pending: None,
            deferred_error: None,
            finished: false,
            buf: Vec::new(),
        })
    }
}

/// Finds a `.yyyyMMdd.` segment such as the one in `app.log.20160613.172129.txt`.
fn date_from_uri(uri: &str) -> Option<NaiveDate> {
    static DATE_SEGMENT: OnceLock<Regex> = OnceLock::new();
    let re = DATE_SEGMENT.get_or_init(|| Regex::new(r"\.(\d{8})\.").unwrap());
    re.captures_iter(uri)
        .find_map(|caps| NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok())
}

#[derive(Debug)]
struct PendingRecord {
    timestamp: String,
    level: String,
    process_id: String,
    message: String,
    // Line break of the last line appended to `message`.
    last_break: &'static str,
}

impl PendingRecord {
    fn push_line(&mut self, line: &str, line_break: &'static str) {
        self.message.push_str(self.last_break);
        self.message.push_str(line);
        self.last_break = line_break;
    }
}

struct MultiLineRecords {
    layout: Arc<LineLayout>,
    redactor: Arc<Redactor>,
    opener: StreamOpener,
    source_uri: Option<String>,
    uri_date: Option<NaiveDate>,
    reader: Option<BufReader<ByteStream>>,
    pending: Option<PendingRecord>,
    // Read error held back while the record read before it is emitted.
    deferred_error: Option<ParserError>,
    finished: bool,
    buf: Vec<u8>,
}

impl MultiLineRecords {
    fn read_line(&mut self) -> Result<Option<(String, &'static str)>, ParserError> {
        if self.reader.is_none() {
            let stream = (self.opener)().map_err(ParserError::Open)?;
            self.reader = Some(BufReader::new(stream));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        self.buf.clear();
        if reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        let (end, line_break) = if self.buf.ends_with(b"\r\n") {
            (self.buf.len() - 2, "\r\n")
        } else if self.buf.ends_with(b"\n") {
            (self.buf.len() - 1, "\n")
        } else {
            (self.buf.len(), "")
        };
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        Ok(Some((line, line_break)))
    }

    fn start_record(&self, caps: &Captures, line_break: &'static str) -> PendingRecord {
        let time = caps.name("ts").map_or("", |m| m.as_str());
        let timestamp = match self.uri_date {
            Some(date) => format!("{}T{}", date.format("%Y-%m-%d"), time),
            None => time.to_string(),
        };

        PendingRecord {
            timestamp,
            level: caps.name("level").map_or("", |m| m.as_str()).to_string(),
            process_id: caps.name("pid").map_or("", |m| m.as_str()).trim().to_string(),
            message: caps.name("msg").map_or("", |m| m.as_str()).to_string(),
            last_break: line_break,
        }
    }

    fn finish(&self, pending: PendingRecord) -> Option<ParsedRecord> {
        let message = pending.message.trim();
        if message.is_empty() {
            trace!(timestamp = %pending.timestamp, "Discarding record with empty message");
            return None;
        }

        let mut record = ParsedRecord::new();
        record.insert(FIELD_TIMESTAMP, pending.timestamp);
        record.insert(FIELD_LEVEL, pending.level);
        record.insert(FIELD_PROCESS_ID, pending.process_id);
        record.insert(FIELD_MESSAGE, self.redactor.redact(message));
        if let Some(uri) = &self.source_uri {
            record.insert(FIELD_SOURCE_URI, uri.as_str());
        }
        Some(record)
    }
}

impl Iterator for MultiLineRecords {
    type Item = Result<ParsedRecord, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.deferred_error.take() {
            return Some(Err(e));
        }
        while !self.finished {
            match self.read_line() {
                Ok(Some((line, line_break))) => {
                    let layout = Arc::clone(&self.layout);
                    if let Some(caps) = layout.pattern.captures(&line) {
                        let started = self.start_record(&caps, line_break);
                        if let Some(done) = self.pending.replace(started) {
                            if let Some(record) = self.finish(done) {
                                return Some(Ok(record));
                            }
                        }
                    } else if let Some(pending) = self.pending.as_mut() {
                        pending.push_line(&line, line_break);
                    }
                    // Lines ahead of the first header have no record to join.
                }
                Ok(None) => {
                    self.finished = true;
                    if let Some(done) = self.pending.take() {
                        return self.finish(done).map(Ok);
                    }
                }
                Err(e) => {
                    self.finished = true;
                    if let Some(record) = self.pending.take().and_then(|done| self.finish(done)) {
                        debug!(error = %e, "Read failed, emitting the record read so far first");
                        self.deferred_error = Some(e);
                        return Some(Ok(record));
                    }
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
