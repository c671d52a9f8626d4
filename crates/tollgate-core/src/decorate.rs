//! Response Decorator
//!
//! Marks allowed responses with the deployment fingerprint: headers on every
//! response, plus an embedded `_wm` marker in JSON object bodies. Anything that
//! is not a JSON object passes through byte-for-byte.

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::response::Response;
use serde_json::{Value, json};

use crate::prelude::*;

pub const X_FINGERPRINT: HeaderName = HeaderName::from_static("x-fingerprint");
pub const X_TIMESTAMP: HeaderName = HeaderName::from_static("x-timestamp");

/// Field holding the marker inside decorated JSON objects
pub const MARKER_FIELD: &str = "_wm";

#[derive(Clone, Debug)]
pub struct Decorator {
	fingerprint: Fingerprint,
	body_limit: usize,
}

impl Decorator {
	pub fn new(fingerprint: Fingerprint, body_limit: usize) -> Self {
		Self { fingerprint, body_limit }
	}

	pub async fn decorate(&self, response: Response, now: Timestamp) -> TgResult<Response> {
		let (mut parts, body) = response.into_parts();
		match fingerprint_header(&self.fingerprint) {
			Ok(val) => {
				parts.headers.insert(X_FINGERPRINT, val);
			}
			Err(err) => warn!("Skipping {} header: {}", X_FINGERPRINT, err),
		}
		parts.headers.insert(X_TIMESTAMP, HeaderValue::from(now.millis()));

		if !is_json(&parts.headers) {
			return Ok(Response::from_parts(parts, body));
		}

		// Streaming or oversized bodies keep the headers only
		let limit = u64::try_from(self.body_limit).unwrap_or(u64::MAX);
		if body.size_hint().upper().is_none_or(|size| size > limit) {
			debug!("Skipping body marker for unbounded or large response");
			return Ok(Response::from_parts(parts, body));
		}

		let bytes = axum::body::to_bytes(body, self.body_limit)
			.await
			.map_err(|e| Error::Decorate(e.to_string()))?;

		let body = match inject_marker(&bytes, self.fingerprint.marker(), now) {
			Some(marked) => {
				parts.headers.remove(header::CONTENT_LENGTH);
				Body::from(marked)
			}
			None => Body::from(bytes),
		};
		Ok(Response::from_parts(parts, body))
	}
}

/// `X-Fingerprint` value: the short form of the fingerprint
pub fn fingerprint_header(fingerprint: &Fingerprint) -> TgResult<HeaderValue> {
	HeaderValue::from_str(fingerprint.short())
		.map_err(|_| Error::Decorate("fingerprint is not a valid header value".into()))
}

/// Re-serializes a JSON object body with `_wm: {fp, ts}` set.
///
/// Returns `None` for anything that is not a JSON object.
pub fn inject_marker(body: &[u8], marker: &str, now: Timestamp) -> Option<Vec<u8>> {
	let mut value: Value = serde_json::from_slice(body).ok()?;
	let object = value.as_object_mut()?;
	object.insert(MARKER_FIELD.into(), json!({ "fp": marker, "ts": now.millis() }));
	serde_json::to_vec(&value).ok()
}

fn is_json(headers: &HeaderMap) -> bool {
	headers
		.get(header::CONTENT_TYPE)
		.and_then(|h| h.to_str().ok())
		.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
}


// vim: ts=4
