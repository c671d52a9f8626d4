use std::fmt;
use tollgate_types::error::Error as TollgateError;

/// Internal error type for the redb adapter
#[derive(Debug)]
pub enum Error {
	RedbError(String),
	CorruptEntry(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::RedbError(msg) => write!(f, "redb error: {}", msg),
			Error::CorruptEntry(key) => write!(f, "corrupt entry: {}", key),
		}
	}
}

impl std::error::Error for Error {}

impl From<Error> for TollgateError {
	fn from(e: Error) -> Self {
		TollgateError::StoreUnavailable(e.to_string())
	}
}

/// Helper to convert redb errors
pub fn from_redb_error<E: fmt::Display>(err: E) -> Error {
	Error::RedbError(err.to_string())
}

// vim: ts=4
