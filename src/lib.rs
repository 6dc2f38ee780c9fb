#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A fluent expression DSL over a distributed key-value store, a declarative policy-resolution
//! matrix for per-operation behavior, and a backpressured record stream tying execution to
//! consumption.
//!
//! # Examples
//!
//! ```
//! use fluentkv::behavior::{self, Mode, OpKind, OpShape, Triple};
//! use fluentkv::expr::{int_bin, lower};
//!
//! let predicate = int_bin("age").gt(17);
//! let (ir, filter) = lower(&predicate.erase()).unwrap();
//! assert!(filter.is_some());
//! let _ = ir;
//!
//! let triple = Triple::new(OpKind::Read, OpShape::Point, Mode::Ap);
//! let settings = behavior::registry::lookup(behavior::DEFAULT_BEHAVIOR).resolve(triple);
//! assert_eq!(settings.max_attempts, 2);
//! ```

mod err;

pub mod behavior;
pub mod exec;
pub mod expr;
pub mod info;
pub mod session;
pub mod stream;

pub use err::Error;
pub use err::ErrorKind;

/// Result type returned by the client
pub type Result<T> = std::result::Result<T, Error>;
