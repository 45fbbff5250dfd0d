use super::strategy::{ScheduleResult, SourceScheduler, StrategyError, WorkItem};
use crate::source::Source;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

pub const WINDOWED: &str = "windowed";

/// Property setting the window width in minutes.
pub const PROP_WINDOW_MINUTES: &str = "WindowMinutes";

const DEFAULT_WINDOW_MINUTES: i64 = 1;
/// Upper bound on windows emitted per pass; older backlog is skipped.
const MAX_WINDOWS: i64 = 1440;

/// Splits the time since the source was last scheduled into fixed-width
/// windows and emits one work item per window. Windows cover the range with
/// no gap, the last one ending exactly at `now`.
#[derive(Debug, Default)]
pub struct WindowedScheduler;

impl WindowedScheduler {
    pub fn new() -> Self {
        Self
    }

    fn window_minutes(source: &Source) -> Result<i64, StrategyError> {
        let Some(raw) = source.property(PROP_WINDOW_MINUTES) else {
            return Ok(DEFAULT_WINDOW_MINUTES);
        };
        match raw.trim().parse::<i64>() {
            Ok(minutes) if minutes > 0 => Ok(minutes),
            _ => Err(Self::invalid_window(source, raw)),
        }
    }

    fn invalid_window(source: &Source, raw: &str) -> StrategyError {
        StrategyError::InvalidProperty {
            source_key: source.type_key.clone(),
            name: PROP_WINDOW_MINUTES.to_string(),
            value: raw.to_string(),
        }
    }

    /// Window width and the earliest instant a window may start at, or `None`
    /// when either falls outside the representable time range.
    fn bounds(minutes: i64, now: DateTime<Utc>) -> Option<(Duration, DateTime<Utc>)> {
        let window = Duration::try_minutes(minutes)?;
        let backlog = Duration::try_minutes(minutes.checked_mul(MAX_WINDOWS)?)?;
        Some((window, now.checked_sub_signed(backlog)?))
    }
}

#[async_trait]
impl SourceScheduler for WindowedScheduler {
    async fn try_schedule(
        &self,
        source: &Source,
        now: DateTime<Utc>,
    ) -> Result<ScheduleResult, StrategyError> {
        let minutes = Self::window_minutes(source)?;
        let (window, earliest) = Self::bounds(minutes, now).ok_or_else(|| {
            Self::invalid_window(source, source.property(PROP_WINDOW_MINUTES).unwrap_or_default())
        })?;
        let frequency = Duration::from_std(source.scheduling_frequency)
            .map_err(|e| StrategyError::Failed(e.to_string()))?;

        let mut from = source
            .last_scheduled
            .or_else(|| now.checked_sub_signed(frequency))
            .unwrap_or(earliest)
            .max(earliest);

        let mut items = Vec::new();
        while from < now {
            let to = from.checked_add_signed(window).map_or(now, |end| end.min(now));
            items.push(WorkItem::new(
                &source.type_key,
                WINDOWED,
                json!({
                    "from": from.to_rfc3339(),
                    "to": to.to_rfc3339(),
                    "connection_string": source.connection_string,
                }),
            ));
            from = to;
        }

        Ok(ScheduleResult::success(items))
    }
}
