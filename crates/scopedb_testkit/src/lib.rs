//! # ScopeDB Testkit
//!
//! Test utilities for ScopeDB:
//! - database fixtures (in-memory and on-disk)
//! - a hook recorder for asserting firing order
//! - a storage backend that fails on demand
//! - proptest strategies and a reference model of nested scopes
//!
//! ```rust
//! use scopedb_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let log = HookLog::new();
//!     let mut cr = db.cursor().unwrap();
//!     cr.after("commit", log.hook("C1")).unwrap();
//!     cr.commit().unwrap();
//!     cr.close().unwrap();
//!     assert_eq!(log.entries(), ["C1"]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod hooks;

/// Common imports for tests.
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::hooks::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use hooks::*;
