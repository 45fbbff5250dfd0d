pub mod local;

pub use local::LocalLockCoordinator;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock '{name}' is held by '{holder}', not '{owner}'")]
    NotOwner {
        name: String,
        owner: String,
        holder: String,
    },

    #[error("lock store error: {0}")]
    Store(String),
}

/// Names a source-scoped mutual-exclusion resource and the instance that wants it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken {
    pub name: String,
    pub owner: String,
}

impl LockToken {
    pub fn for_source(type_key: &str, owner: &str) -> Self {
        Self {
            name: format!("conveyor-source-{}", type_key),
            owner: owner.to_string(),
        }
    }
}

/// Named, time-bounded mutual exclusion shared across scheduler instances.
///
/// Each `try_acquire` call is exactly one attempt. `timeout` doubles as the
/// lease: a lock that is never released lapses once it elapses.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Returns `Ok(false)` when another owner holds an unexpired lease.
    async fn try_acquire(&self, token: &LockToken, timeout: Duration) -> Result<bool, LockError>;

    async fn release(&self, token: &LockToken) -> Result<(), LockError>;
}

/// Identity of this process, used as the lock owner.
pub fn instance_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "conveyor".to_string());
    format!("{}-{}", host, uuid::Uuid::new_v4().simple())
}
