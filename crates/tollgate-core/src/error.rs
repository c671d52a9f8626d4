//! Gate rejection responses
//!
//! The two responses the gate produces itself: a policy denial and an
//! internal error caught at the gate boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::decorate::{X_FINGERPRINT, fingerprint_header};
use crate::policy::DenyReason;
use crate::prelude::*;

#[derive(Debug)]
pub enum GateRejection {
	/// Access policy denied the request
	Denied { reason: DenyReason, fingerprint: Fingerprint },
	/// Handler failure, handler panic or decoration failure
	Internal { fingerprint: Fingerprint },
}

impl std::fmt::Display for GateRejection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			GateRejection::Denied { reason, .. } => match reason.details() {
				Some(details) => write!(f, "Access denied: {} ({})", reason.code(), details),
				None => write!(f, "Access denied: {}", reason.code()),
			},
			GateRejection::Internal { .. } => write!(f, "Internal error"),
		}
	}
}

impl std::error::Error for GateRejection {}

impl IntoResponse for GateRejection {
	fn into_response(self) -> Response {
		let (status, body, fingerprint) = match self {
			GateRejection::Denied { reason, fingerprint } => {
				let body = json!({
					"error": "Access denied",
					"reason": reason.code(),
					"message": "Unauthorized access detected",
					"fingerprint": fingerprint.short(),
				});
				(StatusCode::FORBIDDEN, body, fingerprint)
			}
			GateRejection::Internal { fingerprint } => {
				let body = json!({
					"error": "Internal error",
					"fingerprint": fingerprint.short(),
				});
				(StatusCode::INTERNAL_SERVER_ERROR, body, fingerprint)
			}
		};

		let mut response = (status, Json(body)).into_response();
		if let Ok(val) = fingerprint_header(&fingerprint) {
			response.headers_mut().insert(X_FINGERPRINT, val);
		}
		response
	}
}


// vim: ts=4
