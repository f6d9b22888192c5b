use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes, one per key, created on demand.
///
/// Locking key `A` never waits on a holder of key `B`. The map itself is
/// guarded by a synchronous mutex that is only held long enough to look up
/// (or insert) the per-key slot, never across an `.await`.
///
/// Slots are dropped again once nobody holds or waits on them, so the map
/// doesn't grow with every key ever seen.
///
/// # Examples
///
/// ```
/// use hondana_asyncutils::KeyedMutex;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let locks: KeyedMutex<String> = KeyedMutex::default();
/// let first = locks.lock("alpha").await;
/// // A different key is not blocked by `first`.
/// let second = locks.lock("beta").await;
/// drop((first, second));
/// # }
/// ```
pub struct KeyedMutex<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// Guard returned by [`KeyedMutex::lock`]; the key is released on drop.
pub struct KeyedGuard {
    _guard: OwnedMutexGuard<()>,
}

impl<K> fmt::Debug for KeyedMutex<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock().map_or(0, |slots| slots.len());
        f.debug_struct("KeyedMutex").field("slots", &slots).finish()
    }
}

impl<K> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and take it.
    pub async fn lock(&self, key: impl Into<K>) -> KeyedGuard {
        let slot = self.slot(key.into());
        KeyedGuard { _guard: slot.lock_owned().await }
    }

    /// Take `key` only if nobody else holds it right now.
    pub fn try_lock(&self, key: impl Into<K>) -> Option<KeyedGuard> {
        let slot = self.slot(key.into());
        slot.try_lock_owned().ok().map(|guard| KeyedGuard { _guard: guard })
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Self::evict_idle(&mut slots);
        slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: K) -> Arc<AsyncMutex<()>> {
        // A panic while holding this lock can't leave the map in a broken
        // state (every operation on it is a single insert/retain), so a
        // poisoned lock is safe to keep using.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Self::evict_idle(&mut slots);
        slots.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn evict_idle(slots: &mut HashMap<K, Arc<AsyncMutex<()>>>) {
        // The map owns one reference; any other reference is a holder or waiter.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks: KeyedMutex<String> = KeyedMutex::new();
        let guard = locks.lock("manga:1").await;
        assert!(locks.try_lock("manga:1").is_none());
        drop(guard);
        assert!(locks.try_lock("manga:1").is_some());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks: KeyedMutex<String> = KeyedMutex::new();
        let _a = locks.lock("manga:1").await;
        assert!(locks.try_lock("manga:2").is_some());
    }

    #[tokio::test]
    async fn test_idle_slots_are_evicted() {
        let locks: KeyedMutex<i64> = KeyedMutex::new();
        {
            let _a = locks.lock(1).await;
            let _b = locks.lock(2).await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiters_run_one_at_a_time() {
        let locks: Arc<KeyedMutex<i64>> = Arc::new(KeyedMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (locks, inside, peak) = (locks.clone(), inside.clone(), peak.clone());
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(7).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
