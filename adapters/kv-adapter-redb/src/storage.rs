use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Error;

/// Entry storage table: key -> JSON-encoded `StoredEntry`
pub const TABLE_ENTRIES: redb::TableDefinition<&str, &str> = redb::TableDefinition::new("entries");

/// Value together with its absolute expiration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
	pub v: Box<str>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<u64>,
}

impl StoredEntry {
	pub fn new(value: &str, ttl: Option<Duration>, now: u64) -> Self {
		let exp = ttl.map(|ttl| {
			now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
		});
		Self { v: value.into(), exp }
	}

	pub fn is_expired(&self, now: u64) -> bool {
		self.exp.is_some_and(|exp| now >= exp)
	}

	pub fn encode(&self) -> Result<String, Error> {
		serde_json::to_string(self).map_err(|e| Error::CorruptEntry(e.to_string()))
	}

	pub fn decode(key: &str, raw: &str) -> Result<Self, Error> {
		serde_json::from_str(raw).map_err(|_| Error::CorruptEntry(key.to_string()))
	}
}

/// Current Unix time in milliseconds
pub fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_entry_roundtrip_without_expiry() {
		let entry = StoredEntry::new("true", None, 1000);
		let raw = entry.encode().unwrap();
		assert_eq!(raw, r#"{"v":"true"}"#);
		let back = StoredEntry::decode("k", &raw).unwrap();
		assert!(!back.is_expired(u64::MAX));
	}

	#[test]
	fn test_entry_expiry() {
		let entry = StoredEntry::new("1", Some(Duration::from_secs(3600)), 1000);
		assert_eq!(entry.exp, Some(3_601_000));
		assert!(!entry.is_expired(3_600_999));
		assert!(entry.is_expired(3_601_000));
	}

	#[test]
	fn test_decode_rejects_garbage() {
		assert!(matches!(StoredEntry::decode("k", "not json"), Err(Error::CorruptEntry(_))));
	}
}

// vim: ts=4
