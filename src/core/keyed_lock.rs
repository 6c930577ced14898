//! Per-key async serialization
//!
//! Inbound events for one user must be handled one at a time and in arrival
//! order, while different users proceed in parallel. Each key gets its own fair
//! `tokio::sync::Mutex`, so waiters are woken in the order they queued.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// Locks are created on demand and evicted once nobody holds or awaits them
pub struct KeyedLocks<K: Eq + Hash> {
    locks: Arc<LockMap<K>>,
}

/// Exclusive access to one key; dropping it releases the key
pub struct KeyGuard<K: Eq + Hash> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap<K>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: no holder and no waiter
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &K) -> KeyGuard<K> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            key: key.clone(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<i64>::new());
        let guard = locks.lock(&1).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::<i64>::new();
        let _a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&2)).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_keys_are_evicted() {
        let locks = Arc::new(KeyedLocks::<i64>::new());
        let guard = locks.lock(&7).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&7).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A queued waiter keeps the entry alive
        drop(guard);
        assert_eq!(locks.len(), 1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();

        assert_eq!(locks.len(), 0);
        for chat_id in 0..100 {
            drop(locks.lock(&chat_id).await);
        }
        assert_eq!(locks.len(), 0);
    }
}
