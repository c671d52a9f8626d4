//! Common types: timestamps, the deployment fingerprint and audit records.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngExt;
use serde::{Serialize, Serializer};
use serde_with::skip_serializing_none;

pub const FINGERPRINT_MAX_LEN: usize = 64;
pub const FINGERPRINT_SHORT_LEN: usize = 16;
pub const FINGERPRINT_MARKER_LEN: usize = 8;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// Timestamp //
//***********//
/// Unix time in milliseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Self {
		Timestamp(Utc::now().timestamp_millis())
	}

	pub fn millis(&self) -> i64 {
		self.0
	}

	/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
	pub fn to_iso(&self) -> String {
		DateTime::<Utc>::from_timestamp_millis(self.0)
			.unwrap_or_default()
			.to_rfc3339_opts(SecondsFormat::Millis, true)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

pub fn serialize_timestamp_iso<S>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&ts.to_iso())
}

// Fingerprint //
//*************//
/// Opaque, non-secret identifier of a running deployment.
///
/// Echoed into response headers, JSON markers and every audit record so that
/// copies of the service and its output can be traced back to an instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(Box<str>);

impl Fingerprint {
	/// Uses an externally supplied value, truncated to `FINGERPRINT_MAX_LEN` characters.
	///
	/// Control characters are dropped since the value is echoed into headers.
	pub fn new(value: &str) -> Self {
		let clean: String = value.trim().chars().filter(|c| !c.is_control()).collect();
		Fingerprint(char_prefix(&clean, FINGERPRINT_MAX_LEN).into())
	}

	/// Derives a fresh fingerprint from a v4 UUID, the current time and random noise
	pub fn generate() -> Self {
		let time = to_base36(u64::try_from(Timestamp::now().millis()).unwrap_or_default());
		let mut rng = rand::rng();
		let noise: String =
			(0..11).map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())])).collect();
		let value = format!("{}-{}-{}", uuid::Uuid::new_v4(), time, noise);
		Fingerprint::new(&value)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The part echoed in headers and denial bodies
	pub fn short(&self) -> &str {
		char_prefix(&self.0, FINGERPRINT_SHORT_LEN)
	}

	/// The part embedded in JSON response bodies
	pub fn marker(&self) -> &str {
		char_prefix(&self.0, FINGERPRINT_MARKER_LEN)
	}
}

impl std::fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

fn char_prefix(value: &str, len: usize) -> &str {
	match value.char_indices().nth(len) {
		Some((idx, _)) => &value[..idx],
		None => value,
	}
}

fn to_base36(mut n: u64) -> String {
	if n == 0 {
		return "0".into();
	}
	let mut digits = Vec::new();
	while n > 0 {
		digits.push(BASE36[(n % 36) as usize]);
		n /= 36;
	}
	digits.reverse();
	String::from_utf8(digits).unwrap_or_default()
}

// Audit records //
//***************//
/// One completed, allowed request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
	pub ip: Box<str>,
	pub domain: Box<str>,
	pub endpoint: Box<str>,
	pub user_agent: Box<str>,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub timestamp: Timestamp,
	pub fingerprint: Box<str>,
	pub response_status: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
	RateLimitExceeded,
	PotentialTheft,
}

impl AlertReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			AlertReason::RateLimitExceeded => "rate_limit_exceeded",
			AlertReason::PotentialTheft => "potential_theft",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
	Flagged,
}

/// Raised when a detection rule fires
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
	pub ip: Box<str>,
	pub reason: AlertReason,
	pub data: serde_json::Value,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub timestamp: Timestamp,
	pub fingerprint: Box<str>,
	pub action: AlertAction,
}

/// Where the gate boundary caught a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
	Handler,
	Decorate,
	Panic,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
	pub error: Box<str>,
	pub stage: ErrorStage,
	pub ip: Option<Box<str>>,
	pub endpoint: Option<Box<str>>,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub timestamp: Timestamp,
	pub fingerprint: Box<str>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generated_fingerprint_is_bounded_and_unique() {
		let a = Fingerprint::generate();
		let b = Fingerprint::generate();

		assert!(a.as_str().len() <= FINGERPRINT_MAX_LEN);
		assert!(a.as_str().len() > FINGERPRINT_SHORT_LEN);
		assert_ne!(a, b);
	}

	#[test]
	fn test_supplied_fingerprint_is_truncated() {
		let long = "x".repeat(100);
		let fp = Fingerprint::new(&long);
		assert_eq!(fp.as_str().len(), FINGERPRINT_MAX_LEN);
	}

	#[test]
	fn test_supplied_fingerprint_drops_control_chars() {
		let fp = Fingerprint::new("deploy\u{1}abc\r\n");
		assert_eq!(fp.as_str(), "deployabc");
	}

	#[test]
	fn test_fingerprint_prefixes() {
		let fp = Fingerprint::new("0123456789abcdefghijklmnop");
		assert_eq!(fp.short(), "0123456789abcdef");
		assert_eq!(fp.marker(), "01234567");

		let tiny = Fingerprint::new("abc");
		assert_eq!(tiny.short(), "abc");
		assert_eq!(tiny.marker(), "abc");
	}

	#[test]
	fn test_prefix_respects_char_boundaries() {
		let fp = Fingerprint::new("ééééééééééé");
		assert_eq!(fp.marker().chars().count(), 8);
	}

	#[test]
	fn test_timestamp_iso() {
		assert_eq!(Timestamp(0).to_iso(), "1970-01-01T00:00:00.000Z");
		assert_eq!(Timestamp(1_700_000_000_123).to_iso(), "2023-11-14T22:13:20.123Z");
	}

	#[test]
	fn test_base36() {
		assert_eq!(to_base36(0), "0");
		assert_eq!(to_base36(35), "z");
		assert_eq!(to_base36(36), "10");
	}

	#[test]
	fn test_usage_record_serialization() {
		let record = UsageRecord {
			ip: "203.0.113.7".into(),
			domain: "example.com".into(),
			endpoint: "/status".into(),
			user_agent: "Mozilla/5.0".into(),
			timestamp: Timestamp(0),
			fingerprint: "fp".into(),
			response_status: 200,
		};
		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["userAgent"], "Mozilla/5.0");
		assert_eq!(json["responseStatus"], 200);
		assert_eq!(json["timestamp"], "1970-01-01T00:00:00.000Z");
	}

	#[test]
	fn test_error_record_skips_missing_fields() {
		let record = ErrorRecord {
			error: "boom".into(),
			stage: ErrorStage::Handler,
			ip: None,
			endpoint: Some("/x".into()),
			timestamp: Timestamp(0),
			fingerprint: "fp".into(),
		};
		let json = serde_json::to_value(&record).unwrap();
		assert!(json.get("ip").is_none());
		assert_eq!(json["stage"], "handler");
		assert_eq!(json["endpoint"], "/x");
	}
}

// vim: ts=4
