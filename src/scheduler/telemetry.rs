use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

pub const SCHEDULE_DURATION: &str = "master_scheduler.schedule_duration";
pub const SINCE_LAST_SCHEDULED: &str = "master_scheduler.since_last_scheduled_ms";

/// Receives scheduler measurements, keyed by source.
pub trait TelemetrySink: Send + Sync {
    fn record_duration(&self, name: &str, key: &str, duration: Duration);

    fn record_value(&self, name: &str, key: &str, value: i64);
}

/// Writes measurements as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record_duration(&self, name: &str, key: &str, duration: Duration) {
        info!(metric = name, source = key, duration_ms = duration.as_millis() as u64, "Recorded duration");
    }

    fn record_value(&self, name: &str, key: &str, value: i64) {
        info!(metric = name, source = key, value = value, "Recorded value");
    }
}

/// Awaits `fut` and records how long it took, whatever it returned.
pub async fn instrument<F, T>(sink: &dyn TelemetrySink, name: &str, key: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let output = fut.await;
    sink.record_duration(name, key, started.elapsed());
    output
}
