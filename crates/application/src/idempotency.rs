//! 带过期时间的去重缓存
//!
//! 用于发送消息的客户端幂等键，以及实时中继的消息去重。条目在写入时惰性清理。

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct IdempotencyCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K, V> IdempotencyCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|(inserted, _)| inserted.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;
        self.evict_expired(&mut entries);
        entries.insert(key, (Instant::now(), value));
    }

    /// 在同一次加锁内读取或写入，并发调用者拿到同一个值
    pub async fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        let mut entries = self.entries.lock().await;
        self.evict_expired(&mut entries);
        entries
            .entry(key)
            .or_insert_with(|| (Instant::now(), make()))
            .1
            .clone()
    }

    /// 键不存在（或已过期）时写入并返回 true
    pub async fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut entries = self.entries.lock().await;
        self.evict_expired(&mut entries);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, (Instant::now(), value));
        true
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_expired(&self, entries: &mut HashMap<K, (Instant, V)>) {
        let ttl = self.ttl;
        entries.retain(|_, (inserted, _)| inserted.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = IdempotencyCache::new(Duration::from_secs(30));
        assert!(cache.insert_if_absent("m1", ()).await);
        assert!(!cache.insert_if_absent("m1", ()).await);

        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(cache.get(&"m1").await, None);
        assert!(cache.insert_if_absent("m1", ()).await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn get_returns_live_value() {
        let cache = IdempotencyCache::new(Duration::from_secs(5));
        cache.insert(("user", "key-1"), 42).await;

        assert_eq!(cache.get(&("user", "key-1")).await, Some(42));
        assert_eq!(cache.get(&("other", "key-1")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn get_or_insert_with_keeps_first_value_until_expiry() {
        let cache = IdempotencyCache::new(Duration::from_secs(5));
        assert_eq!(cache.get_or_insert_with("k", || 1).await, 1);
        assert_eq!(cache.get_or_insert_with("k", || 2).await, 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get_or_insert_with("k", || 3).await, 3);
    }
}
