//! Environment configuration

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tollgate_core::GateConfig;
use tollgate_core::config::{parse_enabled_unless_false, parse_header_names};
use tollgate_types::prelude::*;
use tollgate_types::utils::split_list;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
	Redb,
	Memory,
	None,
}

impl FromStr for StoreKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"redb" => Ok(StoreKind::Redb),
			"memory" => Ok(StoreKind::Memory),
			"none" => Ok(StoreKind::None),
			other => Err(Error::Config(format!("STORE: unknown store {:?}", other))),
		}
	}
}

#[derive(Debug)]
pub struct Config {
	pub listen: Box<str>,
	pub store: StoreKind,
	pub db_dir: PathBuf,
	pub admin_token: Option<Box<str>>,
	pub gate: GateConfig,
}

impl Config {
	pub fn from_env() -> TgResult<Self> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Reads every setting through `var`; empty values count as unset
	pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> TgResult<Self> {
		let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());
		let mut gate = GateConfig::default();

		if let Some(fingerprint) = var("FINGERPRINT") {
			gate.fingerprint = Fingerprint::new(&fingerprint);
		}
		if let Some(domains) = var("AUTHORIZED_DOMAINS") {
			gate.authorized_domains = split_list(&domains);
		}
		if let Some(ips) = var("BLOCKED_IPS") {
			gate.blocked_ips = split_list(&ips).into_iter().collect();
		}
		if let Some(max) = var("MAX_REQUESTS_PER_IP") {
			gate.max_requests_per_window = parse_number("MAX_REQUESTS_PER_IP", &max)?;
		}
		gate.auto_disable = parse_enabled_unless_false(var("ENABLE_AUTO_DISABLE").as_deref());
		if let Some(headers) = var("TRUSTED_IP_HEADERS") {
			gate.trusted_ip_headers = parse_header_names(&headers)?;
		}
		if let Some(secs) = var("RATE_WINDOW_SECS") {
			gate.retention.rate_window = Duration::from_secs(parse_number("RATE_WINDOW_SECS", &secs)?);
		}
		if let Some(secs) = var("BLOCK_TTL_SECS") {
			gate.retention.block_ttl = Duration::from_secs(parse_number("BLOCK_TTL_SECS", &secs)?);
		}
		if let Some(ms) = var("STORE_TIMEOUT_MS") {
			gate.store_timeout = Duration::from_millis(parse_number("STORE_TIMEOUT_MS", &ms)?);
		}

		Ok(Config {
			listen: var("LISTEN").unwrap_or_else(|| "127.0.0.1:8080".into()).into(),
			store: var("STORE").map_or(Ok(StoreKind::Redb), |s| s.parse())?,
			db_dir: PathBuf::from(var("DB_DIR").unwrap_or_else(|| "./data".into())),
			admin_token: var("ADMIN_TOKEN").map(Into::into),
			gate,
		})
	}
}

fn parse_number(key: &str, value: &str) -> TgResult<u64> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::Config(format!("{}: expected a number, got {:?}", key, value)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn config(pairs: &[(&str, &str)]) -> TgResult<Config> {
		let vars: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
		Config::from_lookup(|key| vars.get(key).cloned())
	}

	#[test]
	fn test_defaults() {
		let config = config(&[]).unwrap();
		assert_eq!(&*config.listen, "127.0.0.1:8080");
		assert_eq!(config.store, StoreKind::Redb);
		assert_eq!(config.db_dir, PathBuf::from("./data"));
		assert!(config.admin_token.is_none());
		assert_eq!(config.gate.max_requests_per_window, 1000);
		assert!(config.gate.auto_disable);
	}

	#[test]
	fn test_protection_settings() {
		let config = config(&[
			("FINGERPRINT", "deploy-7f3a"),
			("AUTHORIZED_DOMAINS", "example.com, example.org"),
			("BLOCKED_IPS", "192.0.2.1,192.0.2.2"),
			("MAX_REQUESTS_PER_IP", "250"),
			("ENABLE_AUTO_DISABLE", "false"),
			("TRUSTED_IP_HEADERS", "X-Real-IP"),
			("RATE_WINDOW_SECS", "60"),
			("STORE", "memory"),
			("ADMIN_TOKEN", "t0ken"),
		])
		.unwrap();

		assert_eq!(config.gate.fingerprint.as_str(), "deploy-7f3a");
		assert_eq!(config.gate.authorized_domains.len(), 2);
		assert!(config.gate.blocked_ips.contains("192.0.2.2"));
		assert_eq!(config.gate.max_requests_per_window, 250);
		assert!(!config.gate.auto_disable);
		assert_eq!(config.gate.trusted_ip_headers.len(), 1);
		assert_eq!(config.gate.retention.rate_window, Duration::from_secs(60));
		assert_eq!(config.store, StoreKind::Memory);
		assert_eq!(config.admin_token.as_deref(), Some("t0ken"));
	}

	#[test]
	fn test_empty_values_are_unset() {
		let config = config(&[("ADMIN_TOKEN", ""), ("MAX_REQUESTS_PER_IP", " ")]).unwrap();
		assert!(config.admin_token.is_none());
		assert_eq!(config.gate.max_requests_per_window, 1000);
	}

	#[test]
	fn test_invalid_values() {
		assert!(matches!(config(&[("MAX_REQUESTS_PER_IP", "lots")]), Err(Error::Config(_))));
		assert!(matches!(config(&[("STORE", "postgres")]), Err(Error::Config(_))));
		assert!(matches!(config(&[("TRUSTED_IP_HEADERS", "bad header")]), Err(Error::Config(_))));
	}
}

// vim: ts=4
