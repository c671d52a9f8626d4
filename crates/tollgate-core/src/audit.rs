//! Audit Log
//!
//! Best-effort side channel for usage, alert and error records. Writes go
//! through the guarded store, so a failing store only costs the record.

use serde::Serialize;
use serde_json::Value;

use tollgate_types::types::{
	AlertAction, AlertReason, AlertRecord, ErrorRecord, ErrorStage, UsageRecord,
};

use crate::config::RetentionConfig;
use crate::identity::{RequestMeta, UNKNOWN};
use crate::keys;
use crate::prelude::*;
use crate::store::GuardedStore;

/// Kind of record kept in the audit log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
	Usage,
	Alert,
	Error,
}

impl RecordKind {
	pub fn prefix(&self) -> &'static str {
		match self {
			RecordKind::Usage => keys::USAGE_PREFIX,
			RecordKind::Alert => keys::ALERT_PREFIX,
			RecordKind::Error => keys::ERROR_PREFIX,
		}
	}
}

#[derive(Clone, Debug)]
pub struct AuditLog {
	store: GuardedStore,
	fingerprint: Fingerprint,
	retention: RetentionConfig,
}

impl AuditLog {
	pub fn new(store: GuardedStore, fingerprint: Fingerprint, retention: RetentionConfig) -> Self {
		Self { store, fingerprint, retention }
	}

	/// One completed, allowed request
	pub async fn usage(&self, meta: &RequestMeta, response_status: u16) -> bool {
		let timestamp = Timestamp::now();
		let record = UsageRecord {
			ip: meta.identity.clone(),
			domain: meta.domain.clone(),
			endpoint: meta.endpoint.clone(),
			user_agent: meta.user_agent.clone().unwrap_or_else(|| UNKNOWN.into()),
			timestamp,
			fingerprint: self.fingerprint.as_str().into(),
			response_status,
		};
		self.write(&keys::usage(timestamp), &record, self.retention.usage_ttl).await
	}

	pub async fn alert(&self, identity: &str, reason: AlertReason, data: Value) -> bool {
		let timestamp = Timestamp::now();
		info!("Alert {} for {}", reason.as_str(), identity);
		let record = AlertRecord {
			ip: identity.into(),
			reason,
			data,
			timestamp,
			fingerprint: self.fingerprint.as_str().into(),
			action: AlertAction::Flagged,
		};
		self.write(&keys::alert(timestamp), &record, self.retention.alert_ttl).await
	}

	pub async fn error(&self, stage: ErrorStage, error: &str, meta: Option<&RequestMeta>) -> bool {
		let timestamp = Timestamp::now();
		let record = ErrorRecord {
			error: error.into(),
			stage,
			ip: meta.map(|m| m.identity.clone()),
			endpoint: meta.map(|m| m.endpoint.clone()),
			timestamp,
			fingerprint: self.fingerprint.as_str().into(),
		};
		self.write(&keys::error(timestamp), &record, self.retention.error_ttl).await
	}

	/// Most recent records of one kind, newest first. Unreadable entries are skipped.
	pub async fn recent(&self, kind: RecordKind, limit: usize) -> Vec<Value> {
		self.store
			.list(kind.prefix(), None)
			.await
			.iter()
			.rev()
			.filter_map(|(key, raw)| match serde_json::from_str::<Value>(raw) {
				Ok(value) => Some(value),
				Err(e) => {
					debug!("Skipping unreadable record {}: {}", key, e);
					None
				}
			})
			.take(limit)
			.collect()
	}

	async fn write<T: Serialize>(&self, key: &str, record: &T, ttl: std::time::Duration) -> bool {
		match serde_json::to_string(record) {
			Ok(json) => self.store.put(key, &json, Some(ttl)).await,
			Err(e) => {
				warn!("Failed to serialize record {}: {}", key, e);
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use kv_adapter_memory::KvAdapterMemory;
	use serde_json::json;
	use std::sync::Arc;
	use std::time::Duration;

	fn audit_log() -> AuditLog {
		let store =
			GuardedStore::new(Some(Arc::new(KvAdapterMemory::default())), Duration::from_secs(1));
		AuditLog::new(store, Fingerprint::new("fp-0123456789abcdef-xyz"), RetentionConfig::default())
	}

	fn meta() -> RequestMeta {
		RequestMeta {
			identity: "203.0.113.5".into(),
			domain: "example.com".into(),
			endpoint: "/status".into(),
			user_agent: None,
			referer: None,
			accept_language: None,
			accept: None,
		}
	}

	#[tokio::test]
	async fn test_usage_record_encoding() {
		let log = audit_log();
		assert!(log.usage(&meta(), 200).await);

		let records = log.recent(RecordKind::Usage, 10).await;
		assert_eq!(records.len(), 1);
		let record = &records[0];
		assert_eq!(record["ip"], "203.0.113.5");
		assert_eq!(record["domain"], "example.com");
		assert_eq!(record["endpoint"], "/status");
		assert_eq!(record["userAgent"], "unknown");
		assert_eq!(record["responseStatus"], 200);
		assert_eq!(record["fingerprint"], "fp-0123456789abcdef-xyz");
		assert!(record["timestamp"].as_str().is_some_and(|ts| ts.ends_with('Z')));
	}

	#[tokio::test]
	async fn test_alert_record_encoding() {
		let log = audit_log();
		assert!(log.alert("203.0.113.5", AlertReason::RateLimitExceeded, json!({"count": 4})).await);

		let records = log.recent(RecordKind::Alert, 10).await;
		assert_eq!(records[0]["reason"], "rate_limit_exceeded");
		assert_eq!(records[0]["action"], "flagged");
		assert_eq!(records[0]["data"]["count"], 4);
	}

	#[tokio::test]
	async fn test_error_record_encoding() {
		let log = audit_log();
		assert!(log.error(ErrorStage::Panic, "boom", Some(&meta())).await);
		assert!(log.error(ErrorStage::Handler, "failed", None).await);

		let records = log.recent(RecordKind::Error, 10).await;
		assert_eq!(records.len(), 2);
		let with_meta = records.iter().find(|r| r["stage"] == "panic").unwrap();
		assert_eq!(with_meta["endpoint"], "/status");
		let without = records.iter().find(|r| r["stage"] == "handler").unwrap();
		assert!(without.get("ip").is_none());
	}

	#[tokio::test]
	async fn test_recent_is_newest_first_and_limited() {
		let log = audit_log();
		for n in 0..3 {
			log.alert("10.0.0.1", AlertReason::PotentialTheft, json!({"n": n})).await;
			tokio::time::sleep(Duration::from_millis(2)).await;
		}

		let records = log.recent(RecordKind::Alert, 2).await;
		assert_eq!(records.len(), 2);
		assert_eq!(records[0]["data"]["n"], 2);
		assert_eq!(records[1]["data"]["n"], 1);
	}

	#[tokio::test]
	async fn test_absent_store_skips_records() {
		let log = AuditLog::new(GuardedStore::absent(), Fingerprint::generate(), RetentionConfig::default());
		assert!(!log.usage(&meta(), 200).await);
		assert!(log.recent(RecordKind::Usage, 10).await.is_empty());
	}
}

// vim: ts=4
