//! # docmap testkit
//!
//! Test utilities for docmap.
//!
//! This crate provides:
//! - A registry of sample entity types covering references, nested
//!   schemas, lists, inheritance and patterns
//! - A document store whose collections fail on demand
//! - A document store that calls back after each insert
//! - Property-based test generators using proptest
//! - Opt-in tracing output for test runs
//!
//! ## Usage
//!
//! ```rust
//! use docmap_testkit::prelude::*;
//!
//! let models = Models::new();
//! let bob = models.user.create([("username", "bob")]).unwrap();
//! assert_eq!(models.user.count(docmap_core::Query::new()).unwrap(), 1);
//! # drop(bob);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod failing;
pub mod fixtures;
pub mod generators;
pub mod hooked;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::failing::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::hooked::*;
    pub use crate::init_tracing;
}

pub use failing::*;
pub use fixtures::*;
pub use generators::*;
pub use hooked::*;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
