//! Rate & Abuse Tracker
//!
//! Records usage for every allowed request, counts requests per identity in
//! a time window and escalates to an alert and an automatic block when the
//! threshold is exceeded. Never fails the caller.

use std::time::Duration;

use serde_json::json;

use tollgate_types::types::AlertReason;

use crate::audit::AuditLog;
use crate::blocklist::BlockList;
use crate::identity::RequestMeta;
use crate::keys;
use crate::prelude::*;
use crate::store::GuardedStore;

/// What a single `record` call observed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordOutcome {
	/// Counter value after this request, `None` if the counter could not be updated
	pub count: Option<u64>,
	pub escalated: bool,
	pub blocked: bool,
}

#[derive(Clone, Debug)]
pub struct RateTracker {
	store: GuardedStore,
	audit: AuditLog,
	blocklist: BlockList,
	threshold: u64,
	window: Duration,
	auto_disable: bool,
}

impl RateTracker {
	pub fn new(
		store: GuardedStore,
		audit: AuditLog,
		blocklist: BlockList,
		threshold: u64,
		window: Duration,
		auto_disable: bool,
	) -> Self {
		Self { store, audit, blocklist, threshold, window, auto_disable }
	}

	pub async fn record(&self, meta: &RequestMeta, response_status: u16) -> RecordOutcome {
		self.audit.usage(meta, response_status).await;

		let Some(count) = self.store.increment(&keys::rate(&meta.identity), Some(self.window)).await
		else {
			return RecordOutcome::default();
		};

		let mut outcome = RecordOutcome { count: Some(count), ..RecordOutcome::default() };
		if count > self.threshold {
			warn!("Rate limit exceeded by {}: {} > {}", meta.identity, count, self.threshold);
			outcome.escalated = true;
			self.audit
				.alert(
					&meta.identity,
					AlertReason::RateLimitExceeded,
					json!({ "count": count, "threshold": self.threshold }),
				)
				.await;

			if self.auto_disable {
				outcome.blocked = self.blocklist.block(&meta.identity, None).await;
			}
		}
		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audit::RecordKind;
	use crate::blocklist::BlockOrigin;
	use crate::config::RetentionConfig;
	use kv_adapter_memory::KvAdapterMemory;
	use std::sync::Arc;

	fn tracker(threshold: u64, auto_disable: bool) -> RateTracker {
		let store =
			GuardedStore::new(Some(Arc::new(KvAdapterMemory::default())), Duration::from_secs(1));
		let audit = AuditLog::new(store.clone(), Fingerprint::generate(), RetentionConfig::default());
		let blocklist = BlockList::new(Default::default(), store.clone(), Duration::from_secs(60));
		RateTracker::new(store, audit, blocklist, threshold, Duration::from_secs(3600), auto_disable)
	}

	fn meta(identity: &str) -> RequestMeta {
		RequestMeta {
			identity: identity.into(),
			domain: "example.com".into(),
			endpoint: "/data".into(),
			user_agent: Some("Mozilla/5.0".into()),
			referer: None,
			accept_language: None,
			accept: None,
		}
	}

	#[tokio::test]
	async fn test_counts_and_records_usage() {
		let tracker = tracker(10, true);
		let first = tracker.record(&meta("10.0.0.1"), 200).await;
		let second = tracker.record(&meta("10.0.0.1"), 404).await;
		let other = tracker.record(&meta("10.0.0.2"), 200).await;

		assert_eq!(first.count, Some(1));
		assert_eq!(second.count, Some(2));
		assert_eq!(other.count, Some(1));
		assert!(!second.escalated);

		let usage = tracker.audit.recent(RecordKind::Usage, 10).await;
		assert_eq!(usage.len(), 3);
	}

	#[tokio::test]
	async fn test_escalates_above_threshold() {
		let tracker = tracker(2, true);
		for _ in 0..2 {
			assert!(!tracker.record(&meta("10.0.0.9"), 200).await.escalated);
		}

		let third = tracker.record(&meta("10.0.0.9"), 200).await;
		assert!(third.escalated);
		assert!(third.blocked);
		assert_eq!(tracker.blocklist.lookup("10.0.0.9").await, Some(BlockOrigin::Dynamic));

		let alerts = tracker.audit.recent(RecordKind::Alert, 10).await;
		assert_eq!(alerts[0]["reason"], "rate_limit_exceeded");
		assert_eq!(alerts[0]["data"]["count"], 3);
		assert_eq!(alerts[0]["data"]["threshold"], 2);
	}

	#[tokio::test]
	async fn test_auto_disable_off_only_alerts() {
		let tracker = tracker(1, false);
		tracker.record(&meta("10.0.0.5"), 200).await;
		let second = tracker.record(&meta("10.0.0.5"), 200).await;

		assert!(second.escalated);
		assert!(!second.blocked);
		assert_eq!(tracker.blocklist.lookup("10.0.0.5").await, None);
	}

	#[tokio::test]
	async fn test_absent_store_never_escalates() {
		let store = GuardedStore::absent();
		let audit = AuditLog::new(store.clone(), Fingerprint::generate(), RetentionConfig::default());
		let blocklist = BlockList::new(Default::default(), store.clone(), Duration::from_secs(60));
		let tracker = RateTracker::new(store, audit, blocklist, 0, Duration::from_secs(60), true);

		assert_eq!(tracker.record(&meta("10.0.0.1"), 200).await, RecordOutcome::default());
	}
}

// vim: ts=4
