//! Adapter that stores rate counters, block flags and audit records.
//!
//! Every entry may carry a time-to-live. Expired entries must behave as absent
//! for all operations; adapters are free to reclaim the space lazily.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

/// Dynamic block flags, `blocked:{identity}`
pub const BLOCKED_PREFIX: &str = "blocked:";
/// Windowed request counters, `ip:{identity}`
pub const RATE_PREFIX: &str = "ip:";

/// Prefixes of keys that hold live gate state.
///
/// An adapter that bounds its size must never evict these before they expire:
/// a dropped block lifts it early and a dropped counter undercounts.
pub const STATE_PREFIXES: [&str; 2] = [BLOCKED_PREFIX, RATE_PREFIX];

/// Whether `key` holds live gate state rather than an audit record
pub fn is_state_key(key: &str) -> bool {
	STATE_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

#[async_trait]
pub trait KvAdapter: Debug + Send + Sync {
	/// Reads a value, `None` if the key is absent or expired
	async fn get(&self, key: &str) -> TgResult<Option<Box<str>>>;

	/// Writes a value, replacing any previous one and its expiration
	async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> TgResult<()>;

	async fn delete(&self, key: &str) -> TgResult<()>;

	/// Lists live entries whose key starts with `prefix`, in ascending key order
	async fn list(&self, prefix: &str, limit: Option<u32>) -> TgResult<Vec<(Box<str>, Box<str>)>>;

	/// Increments a decimal counter and refreshes its expiration.
	///
	/// Returns the new count. An absent key counts as zero. A stored value that
	/// is not a decimal number is left untouched and `Error::Parse` is returned.
	///
	/// The default implementation re-reads the latest value and writes it back;
	/// it is not atomic. Adapters that can update a key in place should override it.
	async fn increment(&self, key: &str, ttl: Option<Duration>) -> TgResult<u64> {
		let count = match self.get(key).await? {
			Some(value) => value.trim().parse::<u64>()?.saturating_add(1),
			None => 1,
		};
		self.put(key, &count.to_string(), ttl).await?;
		Ok(count)
	}
}


// vim: ts=4
