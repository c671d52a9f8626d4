//! Access Policy Evaluator
//!
//! Decides allow/deny for a request. Checks run in a fixed order and the first
//! failing one wins: block list, domain allowlist, abuse heuristics.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use tollgate_types::types::AlertReason;

use crate::audit::AuditLog;
use crate::blocklist::BlockList;
use crate::identity::{RequestMeta, UNKNOWN};
use crate::prelude::*;

/// Sub-reason of a `theft_detected` denial
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TheftReason {
	ScrapingToolDetected,
	SuspiciousHeaders,
}

impl TheftReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			TheftReason::ScrapingToolDetected => "scraping_tool_detected",
			TheftReason::SuspiciousHeaders => "suspicious_headers",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
	IpBlocked,
	DomainNotAuthorized,
	TheftDetected(TheftReason),
}

impl DenyReason {
	/// Reason code reported in the denial body
	pub fn code(&self) -> &'static str {
		match self {
			DenyReason::IpBlocked => "ip_blocked",
			DenyReason::DomainNotAuthorized => "domain_not_authorized",
			DenyReason::TheftDetected(_) => "theft_detected",
		}
	}

	pub fn details(&self) -> Option<&'static str> {
		match self {
			DenyReason::TheftDetected(reason) => Some(reason.as_str()),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
	Allow,
	Deny(DenyReason),
}

impl Decision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allow)
	}
}

/// Observations the abuse rules are evaluated on, also recorded in alerts
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
	pub is_scraper: bool,
	/// `[no referer, no accept-language, accepts anything]`
	pub suspicious_headers: [bool; 3],
}

impl Indicators {
	pub fn collect(meta: &RequestMeta, automation_signatures: &[Box<str>]) -> Self {
		let user_agent = meta.user_agent.as_deref().unwrap_or_default().to_lowercase();
		Self {
			is_scraper: automation_signatures.iter().any(|sig| user_agent.contains(&**sig)),
			suspicious_headers: [
				meta.referer.is_none(),
				meta.accept_language.is_none(),
				meta.accept.as_deref() == Some("*/*"),
			],
		}
	}

	pub fn suspicious_header_count(&self) -> usize {
		self.suspicious_headers.iter().filter(|flag| **flag).count()
	}
}

/// Heuristic abuse rules
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbuseRule {
	/// User-agent contains a known automation signature
	AutomationSignature,
	/// At least two suspicious header indicators
	SuspiciousHeaders,
}

/// Evaluation order of the abuse rules
pub const ABUSE_RULES: [AbuseRule; 2] = [AbuseRule::AutomationSignature, AbuseRule::SuspiciousHeaders];

const SUSPICIOUS_HEADER_THRESHOLD: usize = 2;

impl AbuseRule {
	pub fn fires(&self, indicators: &Indicators) -> bool {
		match self {
			AbuseRule::AutomationSignature => indicators.is_scraper,
			AbuseRule::SuspiciousHeaders => {
				indicators.suspicious_header_count() >= SUSPICIOUS_HEADER_THRESHOLD
			}
		}
	}

	pub fn reason(&self) -> TheftReason {
		match self {
			AbuseRule::AutomationSignature => TheftReason::ScrapingToolDetected,
			AbuseRule::SuspiciousHeaders => TheftReason::SuspiciousHeaders,
		}
	}
}

/// Permissive substring match in either direction, so subdomains pass.
///
/// This is not an exact-match security control.
pub fn domain_authorized(domain: &str, authorized_domains: &[Box<str>]) -> bool {
	authorized_domains.is_empty()
		|| authorized_domains
			.iter()
			.any(|allowed| domain.contains(&**allowed) || allowed.contains(domain))
}

#[derive(Clone, Debug)]
pub struct PolicyEvaluator {
	blocklist: BlockList,
	audit: AuditLog,
	authorized_domains: Arc<[Box<str>]>,
	automation_signatures: Arc<[Box<str>]>,
}

impl PolicyEvaluator {
	pub fn new(
		blocklist: BlockList,
		audit: AuditLog,
		authorized_domains: Vec<Box<str>>,
		automation_signatures: Vec<Box<str>>,
	) -> Self {
		Self {
			blocklist,
			audit,
			authorized_domains: authorized_domains.into(),
			automation_signatures: automation_signatures
				.iter()
				.map(|sig| Box::from(sig.to_lowercase()))
				.collect(),
		}
	}

	pub async fn evaluate(&self, meta: &RequestMeta) -> Decision {
		if self.blocklist.lookup(&meta.identity).await.is_some() {
			debug!("Identity {} is blocked", meta.identity);
			return Decision::Deny(DenyReason::IpBlocked);
		}

		if !domain_authorized(&meta.domain, &self.authorized_domains) {
			debug!("Domain {} is not authorized", meta.domain);
			return Decision::Deny(DenyReason::DomainNotAuthorized);
		}

		let indicators = Indicators::collect(meta, &self.automation_signatures);
		if let Some(rule) = ABUSE_RULES.iter().find(|rule| rule.fires(&indicators)) {
			let data = json!({
				"domain": meta.domain,
				"userAgent": meta.user_agent.as_deref().unwrap_or(UNKNOWN),
				"indicators": indicators,
			});
			self.audit.alert(&meta.identity, AlertReason::PotentialTheft, data).await;
			return Decision::Deny(DenyReason::TheftDetected(rule.reason()));
		}

		Decision::Allow
	}
}


// vim: ts=4
