//! # solbal Core
//!
//! Core types, errors, and traits shared by the solbal crates.
//!
//! - **Types**: [`Balance`], [`LookupContext`], [`BatchItem`], [`ApiKeyRecord`]
//! - **Errors**: [`SolbalError`] for plumbing, [`LookupError`] for per-key outcomes
//! - **Constants**: service defaults
//! - **Traits**: [`BalanceResolver`], [`ApiKeyStore`], [`AlertSink`]
//!
//! ## Example
//!
//! ```rust
//! use solbal_core::{Balance, LookupError, ErrorKind};
//!
//! let balance = Balance::new(1_000_000_000);
//! assert_eq!(serde_json::to_string(&balance).unwrap(), "1000000000");
//! assert_eq!(LookupError::Timeout.kind(), ErrorKind::Timeout);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ErrorKind, LookupError, Result, SolbalError};
pub use traits::*;
pub use types::*;
