//! Domain types for solbal.
//!
//! - [`Balance`]: account balance in lamports
//! - [`LookupContext`]: deadline carried through a lookup
//! - [`BatchItem`]: per-key outcome of a batch lookup
//! - [`ApiKeyRecord`]: stored API key

mod balance;
mod context;
mod api_key;

pub use balance::*;
pub use context::*;
pub use api_key::*;
