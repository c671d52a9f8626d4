//! Gate Middleware
//!
//! Tower layer that puts the gate in front of an axum router or any other
//! service taking `Request<Body>`.

use std::fmt::Display;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::gate::Gate;

/// Gate middleware layer
#[derive(Clone, Debug)]
pub struct GateLayer {
	gate: Arc<Gate>,
}

impl GateLayer {
	pub fn new(gate: Arc<Gate>) -> Self {
		Self { gate }
	}
}

impl<S> Layer<S> for GateLayer {
	type Service = GateService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		GateService { inner, gate: self.gate.clone() }
	}
}

/// Gate middleware service
#[derive(Clone, Debug)]
pub struct GateService<S> {
	inner: S,
	gate: Arc<Gate>,
}

impl<S> Service<Request<Body>> for GateService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
	S::Error: Display + Send + 'static,
{
	type Response = Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let gate = self.gate.clone();
		// Take the service that was driven to readiness, leave a fresh clone behind
		let clone = self.inner.clone();
		let mut inner = std::mem::replace(&mut self.inner, clone);

		Box::pin(async move {
			// Handler failures become a 500 inside the gate
			Ok(gate.handle(req, |req| inner.call(req)).await)
		})
	}
}

// vim: ts=4
