//! # Rotasink Testkit
//!
//! Test utilities for Rotasink.
//!
//! This crate provides:
//! - Destinations for every backend that can list what they persisted
//! - Canned payload scenarios
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use rotasink_testkit::prelude::*;
//!
//! for dest in TestDestination::all() {
//!     let writer = dest.open("app", 14);
//!     write_all(writer.as_ref(), &hello_world_payloads());
//!     writer.close().unwrap();
//!     assert_eq!(dest.segments().len(), 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
