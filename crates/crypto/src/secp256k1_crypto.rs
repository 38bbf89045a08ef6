use crate::{CryptoError, Result};
use sandbox_types::{Address, H256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};
pub use secp256k1::{PublicKey, SecretKey};

/// ECDSA signature with a recovery id of 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    pub recovery_id: u8,
}

impl Signature {
    pub fn new(r: H256, s: H256, recovery_id: u8) -> Self {
        Signature { r, s, recovery_id }
    }

    fn to_recoverable(&self) -> Result<RecoverableSignature> {
        let recovery_id = RecoveryId::from_i32(self.recovery_id as i32)
            .map_err(|_| CryptoError::InvalidRecoveryId(self.recovery_id))?;

        let mut compact = [0u8; 64];
        compact[0..32].copy_from_slice(self.r.as_bytes());
        compact[32..64].copy_from_slice(self.s.as_bytes());

        Ok(RecoverableSignature::from_compact(&compact, recovery_id)?)
    }
}

/// Sign a 32-byte digest.
pub fn sign_message(message: &H256, private_key: &SecretKey) -> Result<Signature> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_slice(message.as_bytes())?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, private_key)
        .serialize_compact();

    Ok(Signature {
        r: H256::from_slice(&compact[0..32]),
        s: H256::from_slice(&compact[32..64]),
        recovery_id: recovery_id.to_i32() as u8,
    })
}

/// Recover the signer's public key.
pub fn recover_public_key(message: &H256, signature: &Signature) -> Result<PublicKey> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_slice(message.as_bytes())?;
    Ok(secp.recover_ecdsa(&message, &signature.to_recoverable()?)?)
}

/// Recover the signer's address.
pub fn recover_address(message: &H256, signature: &Signature) -> Result<Address> {
    let public_key = recover_public_key(message, signature)?;
    Ok(public_key_to_address(&public_key))
}

/// keccak256 of the uncompressed key without its 0x04 tag, last 20 bytes.
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = crate::keccak256(&uncompressed[1..]);
    crate::address_from_hash(&hash)
}

/// Address controlled by `private_key`.
pub fn secret_key_to_address(private_key: &SecretKey) -> Address {
    let secp = Secp256k1::signing_only();
    public_key_to_address(&PublicKey::from_secret_key(&secp, private_key))
}
