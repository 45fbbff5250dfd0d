pub mod master;
pub mod queue;
pub mod strategy;
pub mod telemetry;
pub mod windowed;

pub use master::{MasterScheduler, PassReport, SchedulerError, SourceOutcome};
pub use queue::{ChannelWorkQueue, QueueError, WorkQueue};
pub use strategy::{
    ScheduleResult, SourceScheduler, StrategyError, StrategyFactory, StrategyRegistry, WorkItem,
};
pub use telemetry::{TelemetrySink, TracingTelemetry};
pub use windowed::WindowedScheduler;
