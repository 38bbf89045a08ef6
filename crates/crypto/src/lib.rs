use sandbox_rlp::Encoder;
use sandbox_types::{Address, H256};
use sha3::{Digest, Keccak256};
use thiserror::Error;

pub mod secp256k1_crypto;
pub use secp256k1_crypto::*;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// keccak256 of the empty byte string, the code hash of every account without code.
pub const KECCAK_EMPTY: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Compute the Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_slice(&hasher.finalize())
}

/// Compute the Keccak-256 hash of multiple slices of data
pub fn keccak256_concat(data: &[&[u8]]) -> H256 {
    let mut hasher = Keccak256::new();
    for slice in data {
        hasher.update(slice);
    }
    H256::from_slice(&hasher.finalize())
}

fn address_from_hash(hash: &H256) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// Address of a contract created with CREATE: `keccak256(rlp([sender, nonce]))[12..]`.
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut encoder = Encoder::new();
    encoder.encode_list_with(|list| {
        list.encode_bytes(sender.as_bytes());
        list.encode_u64(nonce);
    });
    address_from_hash(&keccak256(&encoder.finish()))
}

/// Address of a contract created with CREATE2 (EIP-1014).
pub fn create2_address(sender: &Address, salt: &H256, init_code_hash: &H256) -> Address {
    let hash = keccak256_concat(&[
        &[0xff],
        sender.as_bytes(),
        salt.as_bytes(),
        init_code_hash.as_bytes(),
    ]);
    address_from_hash(&hash)
}
