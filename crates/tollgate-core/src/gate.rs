//! Gate
//!
//! Orchestrates one request: evaluate the access policy, run the downstream
//! handler if allowed, record usage, decorate the response. Handler errors,
//! handler panics and decoration failures are caught here and turned into a
//! 500 response.

use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use tollgate_types::kv_adapter::KvAdapter;
use tollgate_types::types::ErrorStage;

use crate::audit::AuditLog;
use crate::blocklist::BlockList;
use crate::config::{GateConfig, RetentionConfig};
use crate::decorate::Decorator;
use crate::error::GateRejection;
use crate::identity::RequestMeta;
use crate::policy::{Decision, PolicyEvaluator};
use crate::prelude::*;
use crate::store::GuardedStore;
use crate::tracker::RateTracker;

#[derive(Debug)]
pub struct Gate {
	fingerprint: Fingerprint,
	trusted_ip_headers: Arc<[HeaderName]>,
	store: GuardedStore,
	policy: PolicyEvaluator,
	tracker: RateTracker,
	decorator: Decorator,
	audit: AuditLog,
	blocklist: BlockList,
}

impl Gate {
	pub fn builder() -> GateBuilder {
		GateBuilder::new()
	}

	pub fn new(config: GateConfig, adapter: Option<Arc<dyn KvAdapter>>) -> Self {
		let store = GuardedStore::new(adapter, config.store_timeout);
		let audit = AuditLog::new(store.clone(), config.fingerprint.clone(), config.retention.clone());
		let blocklist =
			BlockList::new(config.blocked_ips, store.clone(), config.retention.block_ttl);
		let policy = PolicyEvaluator::new(
			blocklist.clone(),
			audit.clone(),
			config.authorized_domains,
			config.automation_signatures,
		);
		let tracker = RateTracker::new(
			store.clone(),
			audit.clone(),
			blocklist.clone(),
			config.max_requests_per_window,
			config.retention.rate_window,
			config.auto_disable,
		);
		let decorator = Decorator::new(config.fingerprint.clone(), config.decorate_body_limit);

		Self {
			fingerprint: config.fingerprint,
			trusted_ip_headers: config.trusted_ip_headers.into(),
			store,
			policy,
			tracker,
			decorator,
			audit,
			blocklist,
		}
	}

	pub fn fingerprint(&self) -> &Fingerprint {
		&self.fingerprint
	}

	pub fn audit(&self) -> &AuditLog {
		&self.audit
	}

	pub fn blocklist(&self) -> &BlockList {
		&self.blocklist
	}

	pub fn store_available(&self) -> bool {
		self.store.is_available()
	}

	/// Runs one request through the gate.
	///
	/// `handler` is invoked at most once, and only if the policy allows the
	/// request. Dropping the returned future drops the in-flight handler and
	/// skips usage recording.
	pub async fn handle<F, Fut, E>(&self, req: Request<Body>, handler: F) -> Response
	where
		F: FnOnce(Request<Body>) -> Fut,
		Fut: Future<Output = Result<Response, E>>,
		E: Display,
	{
		let meta = RequestMeta::from_request(&req, &self.trusted_ip_headers);

		match AssertUnwindSafe(self.process(req, &meta, handler)).catch_unwind().await {
			Ok(Ok(response)) => response,
			Ok(Err((stage, err))) => self.fail(stage, &err.to_string(), &meta).await,
			Err(panic) => self.fail(ErrorStage::Panic, &panic_message(&*panic), &meta).await,
		}
	}

	async fn process<F, Fut, E>(
		&self,
		req: Request<Body>,
		meta: &RequestMeta,
		handler: F,
	) -> Result<Response, (ErrorStage, Error)>
	where
		F: FnOnce(Request<Body>) -> Fut,
		Fut: Future<Output = Result<Response, E>>,
		E: Display,
	{
		if let Decision::Deny(reason) = self.policy.evaluate(meta).await {
			let rejection = GateRejection::Denied { reason, fingerprint: self.fingerprint.clone() };
			info!("{} {} from {}: {}", meta.domain, meta.endpoint, meta.identity, rejection);
			return Ok(rejection.into_response());
		}

		let response = handler(req)
			.await
			.map_err(|e| (ErrorStage::Handler, Error::Handler(e.to_string())))?;

		let outcome = self.tracker.record(meta, response.status().as_u16()).await;
		debug!("Allowed {} {} from {} (count {:?})", meta.domain, meta.endpoint, meta.identity, outcome.count);

		self.decorator
			.decorate(response, Timestamp::now())
			.await
			.map_err(|e| (ErrorStage::Decorate, e))
	}

	async fn fail(&self, stage: ErrorStage, message: &str, meta: &RequestMeta) -> Response {
		error!("Request {} from {} failed: {}", meta.endpoint, meta.identity, message);
		self.audit.error(stage, message, Some(meta)).await;
		GateRejection::Internal { fingerprint: self.fingerprint.clone() }.into_response()
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(msg) = panic.downcast_ref::<&str>() {
		format!("handler panicked: {}", msg)
	} else if let Some(msg) = panic.downcast_ref::<String>() {
		format!("handler panicked: {}", msg)
	} else {
		"handler panicked".into()
	}
}

/// Builder for a `Gate`
#[derive(Debug, Default)]
pub struct GateBuilder {
	config: GateConfig,
	adapter: Option<Arc<dyn KvAdapter>>,
}

impl GateBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(&mut self, config: GateConfig) -> &mut Self {
		self.config = config;
		self
	}

	pub fn kv_adapter(&mut self, adapter: Arc<dyn KvAdapter>) -> &mut Self {
		self.adapter = Some(adapter);
		self
	}

	pub fn fingerprint(&mut self, fingerprint: Fingerprint) -> &mut Self {
		self.config.fingerprint = fingerprint;
		self
	}

	pub fn authorized_domains<I, S>(&mut self, domains: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		self.config.authorized_domains = domains.into_iter().map(Into::into).collect();
		self
	}

	pub fn blocked_ips<I, S>(&mut self, ips: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		self.config.blocked_ips = ips.into_iter().map(Into::into).collect();
		self
	}

	pub fn max_requests_per_window(&mut self, max: u64) -> &mut Self {
		self.config.max_requests_per_window = max;
		self
	}

	pub fn auto_disable(&mut self, enabled: bool) -> &mut Self {
		self.config.auto_disable = enabled;
		self
	}

	pub fn trusted_ip_headers(&mut self, headers: Vec<HeaderName>) -> &mut Self {
		self.config.trusted_ip_headers = headers;
		self
	}

	pub fn automation_signatures<I, S>(&mut self, signatures: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		self.config.automation_signatures = signatures.into_iter().map(Into::into).collect();
		self
	}

	pub fn retention(&mut self, retention: RetentionConfig) -> &mut Self {
		self.config.retention = retention;
		self
	}

	pub fn rate_window(&mut self, window: Duration) -> &mut Self {
		self.config.retention.rate_window = window;
		self
	}

	pub fn block_ttl(&mut self, ttl: Duration) -> &mut Self {
		self.config.retention.block_ttl = ttl;
		self
	}

	pub fn store_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.config.store_timeout = timeout;
		self
	}

	pub fn decorate_body_limit(&mut self, limit: usize) -> &mut Self {
		self.config.decorate_body_limit = limit;
		self
	}

	pub fn build(&self) -> Gate {
		info!(
			"Gate fingerprint {}, store {}",
			self.config.fingerprint.short(),
			if self.adapter.is_some() { "configured" } else { "absent" }
		);
		Gate::new(self.config.clone(), self.adapter.clone())
	}
}


// vim: ts=4
