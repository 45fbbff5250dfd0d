//! Test doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conveyor::index::{FetchError, IndexClient, IndexError, TemplateFetcher, TemplateResponse};
use conveyor::parser::{ParsedRecord, RecordStream};
use conveyor::scheduler::{
    QueueError, ScheduleResult, SourceScheduler, StrategyError, TelemetrySink, WorkItem, WorkQueue,
};
use conveyor::source::{
    ConfigurationStore, InMemorySourceStore, Source, StoreError, PROP_EVENT_HUB_NAME, PROP_PARSER,
    PROP_STORAGE_CONNECTION_STRING,
};
use conveyor::stream::{
    PartitionContext, ProcessorFactory, StreamConnector, StreamError, StreamPlatform,
    StreamSettings,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INDEX_URL: &str = "http://index.test:9200";
pub const MAPPINGS_PATH: &str = "https://mappings.test/";
pub const SCRIPTED: &str = "scripted";

/// Source scheduled by the scripted strategy, writing to one index.
pub fn scheduled_source(type_key: &str) -> Source {
    let mut source = Source::new(type_key, SCRIPTED);
    source.scheduling_frequency = Duration::from_secs(300);
    source.index_names.insert(format!("{}-logs", type_key));
    source
}

/// Source consumed from an event stream with the given parser.
pub fn stream_source(type_key: &str, hub: &str, parser: &str) -> Source {
    let mut source = Source::new(type_key, SCRIPTED);
    source.connection_string = "Endpoint=sb://hub.test/".to_string();
    for (name, value) in [
        (PROP_PARSER, parser),
        (PROP_EVENT_HUB_NAME, hub),
        (PROP_STORAGE_CONNECTION_STRING, "UseDevelopmentStorage=true"),
    ] {
        source.properties.insert(name.to_string(), value.to_string());
    }
    source
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingIndex {
    mappings: Mutex<HashSet<(String, String)>>,
    upserts: Mutex<Vec<(String, String, String)>>,
    ensured: Mutex<Vec<String>>,
    pushed: Mutex<Vec<ParsedRecord>>,
    push_calls: AtomicUsize,
    fail_push: AtomicBool,
    fail_ensure: AtomicBool,
    skip_bad_records: AtomicBool,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(self, index: &str, type_key: &str) -> Self {
        self.mappings
            .lock()
            .unwrap()
            .insert((index.to_string(), type_key.to_string()));
        self
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ensure(&self, fail: bool) {
        self.fail_ensure.store(fail, Ordering::SeqCst);
    }

    /// Makes pushes index the good records and silently skip failed ones.
    pub fn set_skip_bad_records(&self, skip: bool) {
        self.skip_bad_records.store(skip, Ordering::SeqCst);
    }

    /// (index, type key, mapping body) for every upsert, in order.
    pub fn upserts(&self) -> Vec<(String, String, String)> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn ensured(&self) -> Vec<String> {
        self.ensured.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<ParsedRecord> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexClient for RecordingIndex {
    async fn ensure_index(&self, _url: &str, index: &str) -> Result<(), IndexError> {
        if self.fail_ensure.load(Ordering::SeqCst) {
            return Err(IndexError::Request("index cluster unreachable".to_string()));
        }
        self.ensured.lock().unwrap().push(index.to_string());
        Ok(())
    }

    async fn mapping_exists(
        &self,
        _url: &str,
        index: &str,
        type_key: &str,
    ) -> Result<bool, IndexError> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .contains(&(index.to_string(), type_key.to_string())))
    }

    async fn upsert_mapping(
        &self,
        _url: &str,
        index: &str,
        type_key: &str,
        mapping: &str,
    ) -> Result<(), IndexError> {
        self.upserts.lock().unwrap().push((
            index.to_string(),
            type_key.to_string(),
            mapping.to_string(),
        ));
        self.mappings
            .lock()
            .unwrap()
            .insert((index.to_string(), type_key.to_string()));
        Ok(())
    }

    async fn push_batch(&self, records: RecordStream, _source: &Source) -> Result<usize, IndexError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(IndexError::Request("bulk request failed".to_string()));
        }
        let records: Vec<ParsedRecord> = if self.skip_bad_records.load(Ordering::SeqCst) {
            records.filter_map(Result::ok).collect()
        } else {
            records.collect::<Result<_, _>>()?
        };
        let count = records.len();
        self.pushed.lock().unwrap().extend(records);
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Mapping templates
// ---------------------------------------------------------------------------

pub struct FixedFetcher {
    response: TemplateResponse,
    urls: Mutex<Vec<String>>,
}

impl FixedFetcher {
    pub fn new(response: TemplateResponse) -> Self {
        Self {
            response,
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(TemplateResponse {
            ok: true,
            status: 200,
            body: Some(body.to_string()),
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateFetcher for FixedFetcher {
    async fn get(&self, url: &str) -> Result<TemplateResponse, FetchError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.response.clone())
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Succeeds with this many work items.
    Succeed(usize),
    Unsuccessful,
    Fail,
    Panic,
}

pub struct ScriptedStrategy {
    script: Mutex<Script>,
    calls: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl ScriptedStrategy {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> Vec<(String, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceScheduler for ScriptedStrategy {
    async fn try_schedule(
        &self,
        source: &Source,
        now: DateTime<Utc>,
    ) -> Result<ScheduleResult, StrategyError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.type_key.clone(), now));
        let script = *self.script.lock().unwrap();
        match script {
            Script::Succeed(n) => Ok(ScheduleResult::success(
                (0..n)
                    .map(|i| WorkItem::new(&source.type_key, "test", serde_json::json!({ "n": i })))
                    .collect(),
            )),
            Script::Unsuccessful => Ok(ScheduleResult::failure()),
            Script::Fail => Err(StrategyError::Failed("upstream unavailable".to_string())),
            Script::Panic => panic!("strategy bug"),
        }
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    batches: Mutex<Vec<Vec<WorkItem>>>,
    fail: AtomicBool,
}

impl RecordingQueue {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<WorkItem>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    async fn enqueue_batch(&self, items: Vec<WorkItem>) -> Result<(), QueueError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        self.batches.lock().unwrap().push(items);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    durations: Mutex<Vec<(String, String)>>,
    values: Mutex<Vec<(String, String, i64)>>,
}

impl RecordingTelemetry {
    /// (metric, source) for each recorded duration.
    pub fn durations(&self) -> Vec<(String, String)> {
        self.durations.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<(String, String, i64)> {
        self.values.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_duration(&self, name: &str, key: &str, _duration: Duration) {
        self.durations
            .lock()
            .unwrap()
            .push((name.to_string(), key.to_string()));
    }

    fn record_value(&self, name: &str, key: &str, value: i64) {
        self.values
            .lock()
            .unwrap()
            .push((name.to_string(), key.to_string(), value));
    }
}

/// In-memory store whose writes can be made to fail.
pub struct FlakyStore {
    pub inner: InMemorySourceStore,
    fail_persist: AtomicBool,
    persists: AtomicUsize,
}

impl FlakyStore {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            inner: InMemorySourceStore::new(sources),
            fail_persist: AtomicBool::new(false),
            persists: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub async fn get(&self, type_key: &str) -> Source {
        self.inner.get(type_key).await.unwrap()
    }
}

#[async_trait]
impl ConfigurationStore for FlakyStore {
    async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        self.inner.list_sources().await
    }

    async fn refresh(&self, source: &Source) -> Result<Source, StoreError> {
        self.inner.refresh(source).await
    }

    async fn persist(&self, source: &Source) -> Result<(), StoreError> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::Generic("store is read-only".to_string()));
        }
        self.inner.persist(source).await
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

pub struct FakePartition {
    id: String,
    checkpoints: AtomicUsize,
    fail_checkpoint: AtomicBool,
}

impl FakePartition {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            checkpoints: AtomicUsize::new(0),
            fail_checkpoint: AtomicBool::new(false),
        }
    }

    pub fn checkpoints(&self) -> usize {
        self.checkpoints.load(Ordering::SeqCst)
    }

    pub fn set_fail_checkpoint(&self, fail: bool) {
        self.fail_checkpoint.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PartitionContext for FakePartition {
    fn partition_id(&self) -> &str {
        &self.id
    }

    async fn checkpoint(&self) -> Result<(), StreamError> {
        if self.fail_checkpoint.load(Ordering::SeqCst) {
            return Err(StreamError::Checkpoint {
                partition: self.id.clone(),
                message: "lease lost".to_string(),
            });
        }
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePlatform {
    factory: Mutex<Option<Arc<dyn ProcessorFactory>>>,
    unregistered: AtomicBool,
}

impl FakePlatform {
    pub fn factory(&self) -> Option<Arc<dyn ProcessorFactory>> {
        self.factory.lock().unwrap().clone()
    }

    pub fn is_unregistered(&self) -> bool {
        self.unregistered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamPlatform for FakePlatform {
    async fn register(&self, factory: Arc<dyn ProcessorFactory>) -> Result<(), StreamError> {
        *self.factory.lock().unwrap() = Some(factory);
        Ok(())
    }

    async fn unregister(&self) -> Result<(), StreamError> {
        self.factory.lock().unwrap().take();
        self.unregistered.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a fresh `FakePlatform` per connection.
#[derive(Default)]
pub struct FakeConnector {
    platforms: Mutex<Vec<(StreamSettings, Arc<FakePlatform>)>>,
    connect_delay: Option<Duration>,
    fail_next: AtomicBool,
}

impl FakeConnector {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            connect_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn connections(&self) -> usize {
        self.platforms.lock().unwrap().len()
    }

    pub fn settings(&self, i: usize) -> StreamSettings {
        self.platforms.lock().unwrap()[i].0.clone()
    }

    pub fn platform(&self, i: usize) -> Arc<FakePlatform> {
        Arc::clone(&self.platforms.lock().unwrap()[i].1)
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(
        &self,
        settings: &StreamSettings,
    ) -> Result<Arc<dyn StreamPlatform>, StreamError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StreamError::Connect {
                stream: settings.event_hub_name.clone(),
                message: "namespace not found".to_string(),
            });
        }
        let platform = Arc::new(FakePlatform::default());
        self.platforms
            .lock()
            .unwrap()
            .push((settings.clone(), Arc::clone(&platform)));
        Ok(platform as Arc<dyn StreamPlatform>)
    }
}
