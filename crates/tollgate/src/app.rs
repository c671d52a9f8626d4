//! App builder
//!
//! Wires the gate in front of a protected router, mounts the admin API and
//! runs the HTTP server.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use tollgate_core::{Gate, GateBuilder, GateLayer};
use tollgate_types::kv_adapter::KvAdapter;

use crate::admin::{self, ADMIN_PREFIX};
use crate::demo;
use crate::prelude::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub struct AppBuilderOpts {
	pub listen: Box<str>,
	/// Admin API is mounted only when set
	pub admin_token: Option<Box<str>>,
}

#[derive(Debug)]
pub struct AppBuilder {
	opts: AppBuilderOpts,
	gate: GateBuilder,
	handler: Option<Router>,
}

impl AppBuilder {
	pub fn new() -> Self {
		if let Err(e) = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init()
		{
			debug!("Logging already initialized: {}", e);
		}
		AppBuilder {
			opts: AppBuilderOpts { listen: "127.0.0.1:8080".into(), admin_token: None },
			gate: GateBuilder::new(),
			handler: None,
		}
	}

	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.opts.listen = listen.into();
		self
	}
	pub fn admin_token(&mut self, token: impl Into<Box<str>>) -> &mut Self {
		self.opts.admin_token = Some(token.into());
		self
	}
	/// Downstream router to protect, the demo handler if not set
	pub fn handler(&mut self, handler: Router) -> &mut Self {
		self.handler = Some(handler);
		self
	}
	pub fn kv_adapter(&mut self, kv_adapter: Arc<dyn KvAdapter>) -> &mut Self {
		self.gate.kv_adapter(kv_adapter);
		self
	}
	/// Gate settings: policy, thresholds, retention
	pub fn gate(&mut self) -> &mut GateBuilder {
		&mut self.gate
	}

	/// Builds the gate and the complete router without binding a socket
	pub fn build(&self) -> (Arc<Gate>, Router) {
		let gate = Arc::new(self.gate.build());
		let protected =
			self.handler.clone().unwrap_or_else(|| demo::router(gate.fingerprint().clone()));

		let mut router = protected.layer(GateLayer::new(gate.clone()));
		match &self.opts.admin_token {
			Some(token) => router = router.nest(ADMIN_PREFIX, admin::router(gate.clone(), token)),
			None => info!("Admin API disabled, set ADMIN_TOKEN to enable it"),
		}

		(gate, router.layer(TraceLayer::new_for_http()))
	}

	pub async fn run(self) -> TgResult<()> {
		info!("Tollgate V{}", VERSION);

		let (_gate, router) = self.build();
		let listener = tokio::net::TcpListener::bind(&*self.opts.listen).await.map_err(|e| {
			error!("FATAL: Cannot listen on {}: {}", self.opts.listen, e);
			Error::Io(e)
		})?;
		info!("Listening on {}", self.opts.listen);

		axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
		info!("Server stopped");

		Ok(())
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => info!("Shutdown requested"),
		Err(e) => {
			warn!("Cannot listen for shutdown signal: {}", e);
			std::future::pending::<()>().await;
		}
	}
}

// vim: ts=4
