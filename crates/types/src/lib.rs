pub mod address;
pub mod bytes;
pub mod hash;
pub mod uint;

pub use address::Address;
pub use bytes::Bytes;
pub use hash::{HashExt, H160, H256};
pub use uint::{UintExt, U256, U512};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address checksum")]
    InvalidChecksum,
}

pub type Result<T> = std::result::Result<T, TypesError>;

/// Decode a hex string with or without the `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() % 2 == 1 {
        // Tolerate odd-length quantities like "0x1".
        return hex::decode(format!("0{}", digits))
            .map_err(|_| TypesError::InvalidHex(s.to_string()));
    }
    hex::decode(digits).map_err(|_| TypesError::InvalidHex(s.to_string()))
}
