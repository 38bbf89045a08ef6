use crate::U256;
pub use primitive_types::{H160, H256};

/// Conversions between 32-byte hashes and 256-bit words.
pub trait HashExt {
    /// Copies up to 32 bytes and zero-fills the rest; never panics on length.
    fn from_slice_padded(slice: &[u8]) -> Self;
    fn from_word(word: U256) -> Self;
    fn to_word(&self) -> U256;
}

impl HashExt for H256 {
    fn from_slice_padded(slice: &[u8]) -> Self {
        let mut hash = H256::zero();
        let len = std::cmp::min(slice.len(), 32);
        hash.as_bytes_mut()[..len].copy_from_slice(&slice[..len]);
        hash
    }

    fn from_word(word: U256) -> Self {
        let mut bytes = [0u8; 32];
        word.to_big_endian(&mut bytes);
        H256::from(bytes)
    }

    fn to_word(&self) -> U256 {
        U256::from_big_endian(self.as_bytes())
    }
}
