//! Store key layout
//!
//! Every key the gate writes is built here so the layout stays in one place.
//! Record keys embed the millisecond timestamp, so a prefix listing returns them
//! oldest first.

use tollgate_types::types::Timestamp;
use tollgate_types::utils::random_id;

pub use tollgate_types::kv_adapter::{BLOCKED_PREFIX, RATE_PREFIX};

pub const USAGE_PREFIX: &str = "usage:";
pub const ALERT_PREFIX: &str = "alert:";
pub const ERROR_PREFIX: &str = "error:";

/// Value of a dynamic block entry
pub const BLOCKED_VALUE: &str = "true";

const RECORD_SUFFIX_LEN: usize = 6;

pub fn blocked(identity: &str) -> String {
	format!("{}{}", BLOCKED_PREFIX, identity)
}

pub fn rate(identity: &str) -> String {
	format!("{}{}", RATE_PREFIX, identity)
}

pub fn usage(ts: Timestamp) -> String {
	record(USAGE_PREFIX, ts)
}

pub fn alert(ts: Timestamp) -> String {
	record(ALERT_PREFIX, ts)
}

pub fn error(ts: Timestamp) -> String {
	record(ERROR_PREFIX, ts)
}

// Two records written in the same millisecond must not overwrite each other
fn record(prefix: &str, ts: Timestamp) -> String {
	format!("{}{:013}:{}", prefix, ts.millis(), random_id(RECORD_SUFFIX_LEN))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_identity_keys() {
		assert_eq!(blocked("203.0.113.9"), "blocked:203.0.113.9");
		assert_eq!(rate("unknown"), "ip:unknown");
	}

	#[test]
	fn test_record_keys_are_unique_and_ordered() {
		let a = alert(Timestamp(1_700_000_000_000));
		let b = alert(Timestamp(1_700_000_000_000));
		assert!(a.starts_with("alert:1700000000000:"));
		assert_ne!(a, b);

		let later = usage(Timestamp(1_700_000_000_001));
		let earlier = usage(Timestamp(999));
		assert!(earlier < later);
		assert!(error(Timestamp(1)).starts_with(ERROR_PREFIX));
	}
}

// vim: ts=4
