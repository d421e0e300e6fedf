use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-key async mutexes. The check-then-write window for a car (or a
/// booking) runs under its key's lock so two writers cannot interleave
/// between the read and the write.
pub struct KeyedLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, key: Uuid) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire the lock for `key`, waiting at most `wait`. Returns None on
    /// timeout; the caller surfaces that as a retryable error rather than
    /// proceeding with a partial write.
    pub async fn acquire(&self, key: Uuid, wait: Duration) -> Option<OwnedMutexGuard<()>> {
        let handle = self.handle(key);
        tokio::time::timeout(wait, handle.lock_owned()).await.ok()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks = KeyedLocks::new();
        let key = Uuid::new_v4();

        let guard = locks.acquire(key, Duration::from_millis(50)).await;
        assert!(guard.is_some());
        drop(guard);

        let again = locks.acquire(key, Duration::from_millis(50)).await;
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let locks = KeyedLocks::new();
        let key = Uuid::new_v4();

        let _held = locks.acquire(key, Duration::from_millis(50)).await.unwrap();
        let blocked = locks.acquire(key, Duration::from_millis(20)).await;
        assert!(blocked.is_none());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let locks = KeyedLocks::new();

        let _a = locks
            .acquire(Uuid::new_v4(), Duration::from_millis(20))
            .await
            .unwrap();
        let b = locks.acquire(Uuid::new_v4(), Duration::from_millis(20)).await;
        assert!(b.is_some());
    }
}
