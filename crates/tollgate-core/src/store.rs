//! Guarded Store
//!
//! The only path by which the gate touches the key-value store. Every call is
//! bounded by a timeout and its errors are contained: reads degrade to absent,
//! writes are skipped. Failures are logged at `warn` and never propagate.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{error::Elapsed, timeout};
use tollgate_types::kv_adapter::KvAdapter;

use crate::prelude::*;

#[derive(Clone, Debug)]
pub struct GuardedStore {
	adapter: Option<Arc<dyn KvAdapter>>,
	timeout: Duration,
}

impl GuardedStore {
	pub fn new(adapter: Option<Arc<dyn KvAdapter>>, timeout: Duration) -> Self {
		Self { adapter, timeout }
	}

	/// A store that is not configured at all
	pub fn absent() -> Self {
		Self { adapter: None, timeout: Duration::ZERO }
	}

	pub fn is_available(&self) -> bool {
		self.adapter.is_some()
	}

	pub async fn get(&self, key: &str) -> Option<Box<str>> {
		let adapter = self.adapter.as_ref()?;
		contain("get", key, timeout(self.timeout, adapter.get(key)).await).flatten()
	}

	/// Returns whether the write went through
	pub async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
		let Some(adapter) = self.adapter.as_ref() else { return false };
		contain("put", key, timeout(self.timeout, adapter.put(key, value, ttl)).await).is_some()
	}

	pub async fn delete(&self, key: &str) -> bool {
		let Some(adapter) = self.adapter.as_ref() else { return false };
		contain("delete", key, timeout(self.timeout, adapter.delete(key)).await).is_some()
	}

	/// Live entries under `prefix` in ascending key order, empty on failure
	pub async fn list(&self, prefix: &str, limit: Option<u32>) -> Vec<(Box<str>, Box<str>)> {
		let Some(adapter) = self.adapter.as_ref() else { return Vec::new() };
		contain("list", prefix, timeout(self.timeout, adapter.list(prefix, limit)).await)
			.unwrap_or_default()
	}

	/// New counter value, `None` when the increment did not happen
	pub async fn increment(&self, key: &str, ttl: Option<Duration>) -> Option<u64> {
		let adapter = self.adapter.as_ref()?;
		contain("increment", key, timeout(self.timeout, adapter.increment(key, ttl)).await)
	}
}

fn contain<T>(op: &str, key: &str, res: Result<TgResult<T>, Elapsed>) -> Option<T> {
	let err = match res {
		Ok(Ok(value)) => return Some(value),
		Ok(Err(err)) => err,
		Err(_) => Error::Timeout,
	};
	warn!("Store {} failed for {}: {}", op, key, err);
	None
}


// vim: ts=4
