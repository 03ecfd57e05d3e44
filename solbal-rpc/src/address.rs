//! Wallet address validation.

use solbal_core::constants::{MAX_ADDRESS_LEN, SOLANA_PUBKEY_SIZE};
use solbal_core::error::{Result, SolbalError};

/// Checks that `address` is a base58-encoded 32-byte public key.
///
/// Runs before any network call so malformed input never reaches the node.
pub fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(SolbalError::InvalidAddress("address is empty".into()));
    }
    if address.len() > MAX_ADDRESS_LEN {
        return Err(SolbalError::InvalidAddress(format!(
            "address is {} characters, at most {MAX_ADDRESS_LEN} allowed",
            address.len()
        )));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| SolbalError::InvalidAddress(format!("{address}: {e}")))?;

    if bytes.len() != SOLANA_PUBKEY_SIZE {
        return Err(SolbalError::InvalidAddress(format!(
            "{address}: decodes to {} bytes, expected {SOLANA_PUBKEY_SIZE}",
            bytes.len()
        )));
    }

    Ok(())
}
