use super::{LockCoordinator, LockError, LockToken};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Lease {
    owner: String,
    expires_at: Instant,
}

/// In-process lease table. Suitable for a single node and for tests; multiple
/// processes need a coordinator backed by a shared store.
#[derive(Debug, Default)]
pub struct LocalLockCoordinator {
    leases: Mutex<HashMap<String, Lease>>,
}

impl LocalLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, name: &str) -> bool {
        let leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases
            .get(name)
            .map(|lease| lease.expires_at > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl LockCoordinator for LocalLockCoordinator {
    async fn try_acquire(&self, token: &LockToken, timeout: Duration) -> Result<bool, LockError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Store(e.to_string()))?;
        let now = Instant::now();

        if let Some(lease) = leases.get(&token.name) {
            if lease.expires_at > now && lease.owner != token.owner {
                return Ok(false);
            }
        }

        leases.insert(
            token.name.clone(),
            Lease {
                owner: token.owner.clone(),
                expires_at: now + timeout,
            },
        );
        Ok(true)
    }

    async fn release(&self, token: &LockToken) -> Result<(), LockError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Store(e.to_string()))?;

        match leases.get(&token.name) {
            None => Ok(()),
            Some(lease) if lease.owner == token.owner => {
                leases.remove(&token.name);
                Ok(())
            }
            Some(lease) if lease.expires_at <= Instant::now() => {
                leases.remove(&token.name);
                Ok(())
            }
            Some(lease) => Err(LockError::NotOwner {
                name: token.name.clone(),
                owner: token.owner.clone(),
                holder: lease.owner.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_owner_is_refused() {
        let coordinator = LocalLockCoordinator::new();
        let a = LockToken::for_source("s", "a");
        let b = LockToken::for_source("s", "b");

        assert!(coordinator.try_acquire(&a, Duration::from_secs(30)).await.unwrap());
        assert!(!coordinator.try_acquire(&b, Duration::from_secs(30)).await.unwrap());
        assert!(coordinator.is_held(&a.name));
    }

    #[tokio::test]
    async fn test_release_allows_next_owner() {
        let coordinator = LocalLockCoordinator::new();
        let a = LockToken::for_source("s", "a");
        let b = LockToken::for_source("s", "b");

        assert!(coordinator.try_acquire(&a, Duration::from_secs(30)).await.unwrap());
        coordinator.release(&a).await.unwrap();
        assert!(coordinator.try_acquire(&b, Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn test_different_sources_do_not_contend() {
        let coordinator = LocalLockCoordinator::new();
        let a = LockToken::for_source("s1", "a");
        let b = LockToken::for_source("s2", "b");

        assert!(coordinator.try_acquire(&a, Duration::from_secs(30)).await.unwrap());
        assert!(coordinator.try_acquire(&b, Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_lapses_after_timeout() {
        let coordinator = LocalLockCoordinator::new();
        let a = LockToken::for_source("s", "a");
        let b = LockToken::for_source("s", "b");

        assert!(coordinator.try_acquire(&a, Duration::from_secs(5)).await.unwrap());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(coordinator.try_acquire(&b, Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_owner_release_is_rejected() {
        let coordinator = LocalLockCoordinator::new();
        let a = LockToken::for_source("s", "a");
        let b = LockToken::for_source("s", "b");

        coordinator.try_acquire(&a, Duration::from_secs(30)).await.unwrap();
        let result = coordinator.release(&b).await;
        assert!(matches!(result, Err(LockError::NotOwner { .. })));
        assert!(coordinator.is_held(&a.name));
    }
}
