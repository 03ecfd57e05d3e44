//! # solbal RPC
//!
//! Solana JSON-RPC upstream for the balance cache.
//!
//! - [`SolanaRpcClient`]: `getBalance` over HTTP, usable as a
//!   [`BalanceResolver`](solbal_core::BalanceResolver)
//! - [`validate_address`]: base58 public key check

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod address;
mod client;

pub use address::validate_address;
pub use client::{RpcConfig, SolanaRpcClient};
