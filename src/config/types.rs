use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Lease taken on a source for one scheduling pass.
    #[serde(default = "default_lock_duration_seconds")]
    pub lock_duration_seconds: u64,
    #[serde(default = "default_pass_interval", with = "humantime_serde")]
    pub pass_interval: Duration,
    /// Capacity of the in-process work queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl SchedulerConfig {
    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.lock_duration_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_duration_seconds: default_lock_duration_seconds(),
            pass_interval: default_pass_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_lock_duration_seconds() -> u64 {
    30
}

fn default_pass_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_queue_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub url: String,
    /// Prefix that `<mapping name>.json` is appended to.
    pub mappings_path: String,
    #[serde(default = "default_template_timeout", with = "humantime_serde")]
    pub template_timeout: Duration,
}

fn default_template_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_checkpoint_interval", with = "humantime_serde")]
    pub checkpoint_interval: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
        }
    }
}

fn default_checkpoint_interval() -> Duration {
    crate::stream::DEFAULT_CHECKPOINT_INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_sections_omitted() {
        let yaml = r#"
index:
  url: http://localhost:9200
  mappings_path: https://example.com/mappings/
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scheduler.lock_duration(), Duration::from_secs(30));
        assert_eq!(config.scheduler.pass_interval, Duration::from_secs(30));
        assert_eq!(config.consumer.checkpoint_interval, Duration::from_secs(60));
        assert_eq!(config.index.template_timeout, Duration::from_secs(30));
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = r#"
scheduler:
  lock_duration_seconds: 10
  pass_interval: 2m
index:
  url: http://localhost:9200
  mappings_path: /mappings/
consumer:
  checkpoint_interval: 90s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scheduler.lock_duration(), Duration::from_secs(10));
        assert_eq!(config.scheduler.pass_interval, Duration::from_secs(120));
        assert_eq!(config.consumer.checkpoint_interval, Duration::from_secs(90));
    }
}
