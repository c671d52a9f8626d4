pub use crate::error::{Error, TgResult};
pub use crate::types::{Fingerprint, Timestamp};
pub use tracing::{debug, error, info, warn};

// vim: ts=4
