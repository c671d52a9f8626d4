pub use tollgate_types::prelude::*;

// vim: ts=4
