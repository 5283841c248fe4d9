use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use wsrt_core::RuntimeIdentity;

type LockMap = HashMap<RuntimeIdentity, Arc<AsyncMutex<()>>>;

/// One async lock per runtime identity, so cleanups of the same runtime never overlap.
///
/// An identity's entry lives only while someone holds or waits for its lock.
#[derive(Debug, Default)]
pub struct CleanupLocks {
    locks: Mutex<LockMap>,
}

impl CleanupLocks {
    pub async fn acquire(&self, identity: &RuntimeIdentity) -> CleanupGuard<'_> {
        let lock = {
            let mut locks = self.map();
            Arc::clone(locks.entry(identity.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        CleanupGuard {
            owner: self,
            identity: identity.clone(),
            guard: Some(guard),
        }
    }

    /// Identities with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive cleanup access to one runtime; releases the map entry when the last user leaves.
#[derive(Debug)]
pub struct CleanupGuard<'a> {
    owner: &'a CleanupLocks,
    identity: RuntimeIdentity,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the map holds the only reference when nobody waits.
        drop(self.guard.take());
        let mut locks = self.owner.map();
        if locks
            .get(&self.identity)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_identity_is_exclusive() {
        let locks = Arc::new(CleanupLocks::default());
        let identity = RuntimeIdentity::new("ws-1", "default", "alice");

        let held = locks.acquire(&identity).await;
        let contender = {
            let locks = Arc::clone(&locks);
            let identity = identity.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&identity).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_other_identities_do_not_wait() {
        let locks = CleanupLocks::default();
        let _first = locks.acquire(&RuntimeIdentity::new("ws-1", "default", "alice")).await;
        let _second = locks.acquire(&RuntimeIdentity::new("ws-2", "default", "alice")).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_released_after_cleanup() {
        let locks = CleanupLocks::default();
        for n in 0..1000 {
            let identity = RuntimeIdentity::new(format!("ws-{n}"), "default", "alice");
            let _guard = locks.acquire(&identity).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
