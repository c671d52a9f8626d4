//! In-memory key-value adapter
//!
//! Audit records live in an LRU cache so a flood of requests cannot grow the
//! process without bound. Gate state (block flags and rate counters) is kept in
//! a separate map that is never evicted; its expired entries are swept once it
//! grows past the record capacity. Expiration is otherwise checked lazily on
//! access.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use tollgate_types::kv_adapter::{KvAdapter, is_state_key};
use tollgate_types::prelude::*;

/// Default number of audit records kept before the least recently used ones are evicted
pub const DEFAULT_CAPACITY: usize = 100_000;

#[derive(Debug, Clone)]
struct Entry {
	value: Box<str>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn new(value: &str, ttl: Option<Duration>, now: Instant) -> Self {
		Entry { value: value.into(), expires_at: ttl.map(|ttl| now + ttl) }
	}

	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|exp| now >= exp)
	}
}

#[derive(Debug)]
struct Tables {
	state: HashMap<Box<str>, Entry>,
	records: LruCache<Box<str>, Entry>,
	/// State map size that triggers the next sweep of expired entries
	sweep_at: usize,
}

impl Tables {
	fn insert(&mut self, key: &str, entry: Entry, now: Instant) {
		if is_state_key(key) {
			self.state.insert(key.into(), entry);
			if self.state.len() >= self.sweep_at {
				self.state.retain(|_, entry| !entry.is_expired(now));
				self.sweep_at = self.sweep_at.max(self.state.len().saturating_mul(2));
				debug!("Swept state entries, {} live", self.state.len());
			}
		} else {
			self.records.put(key.into(), entry);
		}
	}

	fn live(&mut self, key: &str, now: Instant) -> Option<&Entry> {
		if is_state_key(key) {
			if self.state.get(key).is_some_and(|entry| entry.is_expired(now)) {
				self.state.remove(key);
			}
			self.state.get(key)
		} else {
			if self.records.peek(key).is_some_and(|entry| entry.is_expired(now)) {
				self.records.pop(key);
			}
			self.records.get(key)
		}
	}

	fn remove(&mut self, key: &str) {
		if is_state_key(key) {
			self.state.remove(key);
		} else {
			self.records.pop(key);
		}
	}
}

#[derive(Debug)]
pub struct KvAdapterMemory {
	tables: Mutex<Tables>,
}

impl KvAdapterMemory {
	/// `capacity` bounds the audit records; gate state is only bounded by expiry
	pub fn new(capacity: usize) -> Self {
		// DEFAULT_CAPACITY is non-zero
		const FALLBACK: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CAPACITY) {
			Some(v) => v,
			None => unreachable!(),
		};
		let cap = NonZeroUsize::new(capacity).unwrap_or(FALLBACK);
		let tables =
			Tables { state: HashMap::new(), records: LruCache::new(cap), sweep_at: cap.get() };
		Self { tables: Mutex::new(tables) }
	}

	/// Number of stored entries, including expired ones not yet reclaimed
	pub fn len(&self) -> usize {
		let tables = self.tables.lock();
		tables.state.len() + tables.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops every expired entry, returning how many were removed
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut tables = self.tables.lock();

		let before = tables.state.len();
		tables.state.retain(|_, entry| !entry.is_expired(now));
		let mut removed = before - tables.state.len();

		let expired: Vec<Box<str>> = tables
			.records
			.iter()
			.filter(|(_, entry)| entry.is_expired(now))
			.map(|(key, _)| key.clone())
			.collect();
		for key in &expired {
			tables.records.pop(key);
		}
		removed += expired.len();

		if removed > 0 {
			debug!("Purged {} expired entries", removed);
		}
		removed
	}
}

impl Default for KvAdapterMemory {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[async_trait]
impl KvAdapter for KvAdapterMemory {
	async fn get(&self, key: &str) -> TgResult<Option<Box<str>>> {
		let now = Instant::now();
		Ok(self.tables.lock().live(key, now).map(|entry| entry.value.clone()))
	}

	async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> TgResult<()> {
		let now = Instant::now();
		self.tables.lock().insert(key, Entry::new(value, ttl, now), now);
		Ok(())
	}

	async fn delete(&self, key: &str) -> TgResult<()> {
		self.tables.lock().remove(key);
		Ok(())
	}

	async fn list(&self, prefix: &str, limit: Option<u32>) -> TgResult<Vec<(Box<str>, Box<str>)>> {
		let now = Instant::now();
		let tables = self.tables.lock();
		let mut items: Vec<(Box<str>, Box<str>)> = tables
			.state
			.iter()
			.chain(tables.records.iter())
			.filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
			.map(|(key, entry)| (key.clone(), entry.value.clone()))
			.collect();
		drop(tables);

		items.sort_by(|a, b| a.0.cmp(&b.0));
		if let Some(limit) = limit {
			items.truncate(limit as usize);
		}
		Ok(items)
	}

	async fn increment(&self, key: &str, ttl: Option<Duration>) -> TgResult<u64> {
		let now = Instant::now();
		let mut tables = self.tables.lock();

		let current = match tables.live(key, now) {
			Some(entry) => entry.value.trim().parse::<u64>()?,
			None => 0,
		};
		let count = current.saturating_add(1);
		tables.insert(key, Entry::new(&count.to_string(), ttl, now), now);

		Ok(count)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[tokio::test]
	async fn test_put_get_delete() {
		let kv = KvAdapterMemory::default();

		assert_eq!(kv.get("blocked:10.0.0.1").await.unwrap(), None);
		kv.put("blocked:10.0.0.1", "true", None).await.unwrap();
		assert_eq!(kv.get("blocked:10.0.0.1").await.unwrap().as_deref(), Some("true"));

		kv.delete("blocked:10.0.0.1").await.unwrap();
		assert_eq!(kv.get("blocked:10.0.0.1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_entries_expire() {
		let kv = KvAdapterMemory::default();
		kv.put("ip:10.0.0.1", "5", Some(Duration::from_millis(20))).await.unwrap();
		assert!(kv.get("ip:10.0.0.1").await.unwrap().is_some());

		tokio::time::sleep(Duration::from_millis(40)).await;
		assert_eq!(kv.get("ip:10.0.0.1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_list_by_prefix() {
		let kv = KvAdapterMemory::default();
		kv.put("alert:2", "b", None).await.unwrap();
		kv.put("alert:1", "a", None).await.unwrap();
		kv.put("usage:1", "u", None).await.unwrap();
		kv.put("alert:3", "gone", Some(Duration::ZERO)).await.unwrap();

		let alerts = kv.list("alert:", None).await.unwrap();
		let keys: Vec<&str> = alerts.iter().map(|(k, _)| k.as_ref()).collect();
		assert_eq!(keys, vec!["alert:1", "alert:2"]);

		let limited = kv.list("alert:", Some(1)).await.unwrap();
		assert_eq!(limited.len(), 1);
	}

	#[tokio::test]
	async fn test_increment() {
		let kv = KvAdapterMemory::default();
		assert_eq!(kv.increment("ip:a", None).await.unwrap(), 1);
		assert_eq!(kv.increment("ip:a", None).await.unwrap(), 2);

		kv.put("ip:b", "garbage", None).await.unwrap();
		assert!(matches!(kv.increment("ip:b", None).await, Err(Error::Parse)));
		assert_eq!(kv.get("ip:b").await.unwrap().as_deref(), Some("garbage"));
	}

	#[tokio::test]
	async fn test_increment_restarts_after_expiry() {
		let kv = KvAdapterMemory::default();
		kv.put("ip:a", "41", Some(Duration::ZERO)).await.unwrap();
		assert_eq!(kv.increment("ip:a", None).await.unwrap(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_increments_are_not_lost() {
		let kv = Arc::new(KvAdapterMemory::default());
		let mut handles = Vec::new();
		for _ in 0..64 {
			let kv = kv.clone();
			handles.push(tokio::spawn(async move { kv.increment("ip:x", None).await }));
		}
		for handle in handles {
			handle.await.unwrap().unwrap();
		}
		assert_eq!(kv.get("ip:x").await.unwrap().as_deref(), Some("64"));
	}

	#[tokio::test]
	async fn test_capacity_evicts_least_recently_used() {
		let kv = KvAdapterMemory::new(2);
		kv.put("usage:1", "1", None).await.unwrap();
		kv.put("usage:2", "2", None).await.unwrap();
		kv.put("usage:3", "3", None).await.unwrap();

		assert_eq!(kv.len(), 2);
		assert_eq!(kv.get("usage:1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_record_pressure_keeps_state() {
		let kv = KvAdapterMemory::new(4);
		kv.put("blocked:6.6.6.6", "true", Some(Duration::from_secs(600))).await.unwrap();
		kv.increment("ip:6.6.6.6", Some(Duration::from_secs(600))).await.unwrap();

		for i in 0..50 {
			kv.put(&format!("usage:{:04}", i), "{}", None).await.unwrap();
			kv.put(&format!("alert:{:04}", i), "{}", None).await.unwrap();
		}

		assert_eq!(kv.get("blocked:6.6.6.6").await.unwrap().as_deref(), Some("true"));
		assert_eq!(kv.increment("ip:6.6.6.6", None).await.unwrap(), 2);
		assert_eq!(kv.list("usage:", None).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_state_sweep_drops_only_expired() {
		let kv = KvAdapterMemory::new(2);
		kv.put("ip:a", "1", Some(Duration::ZERO)).await.unwrap();
		// Reaching the sweep threshold reclaims the expired counter
		kv.put("blocked:b", "true", None).await.unwrap();
		kv.put("blocked:c", "true", None).await.unwrap();

		assert_eq!(kv.len(), 2);
		assert!(kv.get("blocked:b").await.unwrap().is_some());
		assert!(kv.get("blocked:c").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_list_spans_state_and_records() {
		let kv = KvAdapterMemory::default();
		kv.put("blocked:10.0.0.2", "true", None).await.unwrap();
		kv.put("blocked:10.0.0.1", "true", None).await.unwrap();
		kv.put("usage:1", "u", None).await.unwrap();

		let blocked = kv.list("blocked:", None).await.unwrap();
		let keys: Vec<&str> = blocked.iter().map(|(k, _)| k.as_ref()).collect();
		assert_eq!(keys, vec!["blocked:10.0.0.1", "blocked:10.0.0.2"]);
		assert_eq!(kv.list("", None).await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn test_purge_expired() {
		let kv = KvAdapterMemory::default();
		kv.put("a", "1", Some(Duration::ZERO)).await.unwrap();
		kv.put("b", "2", None).await.unwrap();

		assert_eq!(kv.purge_expired(), 1);
		assert_eq!(kv.len(), 1);
	}
}

// vim: ts=4
