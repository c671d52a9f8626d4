//! Gate Configuration
//!
//! Configuration structs for access policy, rate tracking and record retention.
//! Defaults mirror the values the protection system has always shipped with.

use std::collections::HashSet;
use std::time::Duration;

use axum::http::HeaderName;

use crate::prelude::*;

/// Requests allowed per identity within one rate window before escalation
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: u64 = 1000;

/// Headers consulted for the client identity, most trusted first
pub const DEFAULT_TRUSTED_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "x-forwarded-ip"];

/// User-agent fragments of crawlers, scrapers and scripted HTTP clients
pub const DEFAULT_AUTOMATION_SIGNATURES: [&str; 9] = [
	"scrapy",
	"crawler",
	"bot",
	"spider",
	"scraper",
	"wget",
	"curl",
	"python-requests",
	"node-fetch",
];

/// Bodies above this size are never buffered for watermarking
pub const DEFAULT_DECORATE_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

const DAY: u64 = 86400;

/// How long each kind of store entry lives
#[derive(Clone, Debug)]
pub struct RetentionConfig {
	/// Rate counter window, refreshed on every counted request
	pub rate_window: Duration,
	/// Dynamic block created by auto-disable or the admin API
	pub block_ttl: Duration,
	pub usage_ttl: Duration,
	pub alert_ttl: Duration,
	pub error_ttl: Duration,
}

impl Default for RetentionConfig {
	fn default() -> Self {
		Self {
			rate_window: Duration::from_secs(3600), // 1 hour
			block_ttl: Duration::from_secs(DAY * 7),
			usage_ttl: Duration::from_secs(DAY * 30),
			alert_ttl: Duration::from_secs(DAY * 90),
			error_ttl: Duration::from_secs(DAY * 7),
		}
	}
}

/// Main gate configuration
#[derive(Clone, Debug)]
pub struct GateConfig {
	pub fingerprint: Fingerprint,
	/// Empty means no domain restriction
	pub authorized_domains: Vec<Box<str>>,
	/// Identities denied regardless of store state
	pub blocked_ips: HashSet<Box<str>>,
	pub max_requests_per_window: u64,
	/// Block identities automatically when they exceed the threshold
	pub auto_disable: bool,
	pub trusted_ip_headers: Vec<HeaderName>,
	/// Lowercase user-agent fragments
	pub automation_signatures: Vec<Box<str>>,
	pub retention: RetentionConfig,
	/// Upper bound for every single store call
	pub store_timeout: Duration,
	pub decorate_body_limit: usize,
}

impl Default for GateConfig {
	fn default() -> Self {
		Self {
			fingerprint: Fingerprint::generate(),
			authorized_domains: Vec::new(),
			blocked_ips: HashSet::new(),
			max_requests_per_window: DEFAULT_MAX_REQUESTS_PER_WINDOW,
			auto_disable: true,
			trusted_ip_headers: DEFAULT_TRUSTED_IP_HEADERS
				.iter()
				.map(|name| HeaderName::from_static(name))
				.collect(),
			automation_signatures: DEFAULT_AUTOMATION_SIGNATURES.iter().map(|s| Box::from(*s)).collect(),
			retention: RetentionConfig::default(),
			store_timeout: DEFAULT_STORE_TIMEOUT,
			decorate_body_limit: DEFAULT_DECORATE_BODY_LIMIT,
		}
	}
}

/// Parses a comma-separated header name list, e.g. `CF-Connecting-IP, X-Real-IP`
pub fn parse_header_names(value: &str) -> TgResult<Vec<HeaderName>> {
	tollgate_types::utils::split_list(value)
		.iter()
		.map(|name| {
			HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
				.map_err(|_| Error::Config(format!("invalid header name: {}", name)))
		})
		.collect()
}

/// Feature toggles that stay on unless explicitly set to `false`
pub fn parse_enabled_unless_false(value: Option<&str>) -> bool {
	value.is_none_or(|v| v.trim() != "false")
}


// vim: ts=4
