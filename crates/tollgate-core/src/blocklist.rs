//! Block list
//!
//! Static blocks come from configuration and are always consulted from memory.
//! Dynamic blocks live in the store as `blocked:{identity}` with a TTL.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::keys;
use crate::prelude::*;
use crate::store::GuardedStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOrigin {
	/// Configured at startup, permanent
	Static,
	/// Written by escalation or the admin API, time-boxed
	Dynamic,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockEntry {
	pub ip: Box<str>,
	pub origin: BlockOrigin,
}

#[derive(Clone, Debug)]
pub struct BlockList {
	static_ips: Arc<HashSet<Box<str>>>,
	store: GuardedStore,
	ttl: Duration,
}

impl BlockList {
	pub fn new(static_ips: HashSet<Box<str>>, store: GuardedStore, ttl: Duration) -> Self {
		Self { static_ips: Arc::new(static_ips), store, ttl }
	}

	/// Origin of the block in effect for `identity`, if any.
	///
	/// An unreachable store reads as not blocked.
	pub async fn lookup(&self, identity: &str) -> Option<BlockOrigin> {
		if self.static_ips.contains(identity) {
			return Some(BlockOrigin::Static);
		}
		match self.store.get(&keys::blocked(identity)).await {
			Some(value) if &*value == keys::BLOCKED_VALUE => Some(BlockOrigin::Dynamic),
			_ => None,
		}
	}

	/// Writes a dynamic block, `ttl` defaults to the configured block TTL
	pub async fn block(&self, identity: &str, ttl: Option<Duration>) -> bool {
		let ttl = ttl.unwrap_or(self.ttl);
		let ok = self.store.put(&keys::blocked(identity), keys::BLOCKED_VALUE, Some(ttl)).await;
		if ok {
			info!("Blocked {} for {}s", identity, ttl.as_secs());
		}
		ok
	}

	/// Removes a dynamic block; static blocks cannot be lifted at runtime
	pub async fn unblock(&self, identity: &str) -> bool {
		let ok = self.store.delete(&keys::blocked(identity)).await;
		if ok {
			info!("Unblocked {}", identity);
		}
		ok
	}

	/// Every block in effect, static entries first
	pub async fn list(&self) -> Vec<BlockEntry> {
		let mut entries: Vec<BlockEntry> = self
			.static_ips
			.iter()
			.map(|ip| BlockEntry { ip: ip.clone(), origin: BlockOrigin::Static })
			.collect();
		entries.sort_by(|a, b| a.ip.cmp(&b.ip));

		for (key, value) in self.store.list(keys::BLOCKED_PREFIX, None).await {
			if &*value != keys::BLOCKED_VALUE {
				continue;
			}
			if let Some(ip) = key.strip_prefix(keys::BLOCKED_PREFIX) {
				entries.push(BlockEntry { ip: ip.into(), origin: BlockOrigin::Dynamic });
			}
		}
		entries
	}
}


// vim: ts=4
