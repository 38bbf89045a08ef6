use primitive_types::{U256 as PrimitiveU256, U512 as PrimitiveU512};

pub type U256 = PrimitiveU256;
pub type U512 = PrimitiveU512;

pub trait UintExt: Sized {
    /// Right-aligned big-endian decode; input longer than 32 bytes keeps the first 32.
    fn from_be_bytes_vec(bytes: &[u8]) -> Self;
    /// Minimal big-endian encoding; zero encodes as `[0]`.
    fn to_be_bytes_vec(&self) -> Vec<u8>;
    fn to_be_bytes32(&self) -> [u8; 32];
    /// `Some` when the value fits a `usize`.
    fn try_as_usize(&self) -> Option<usize>;
}

impl UintExt for U256 {
    fn from_be_bytes_vec(bytes: &[u8]) -> Self {
        let mut array = [0u8; 32];
        let len = std::cmp::min(bytes.len(), 32);
        let offset = 32 - len;
        array[offset..].copy_from_slice(&bytes[..len]);
        U256::from_big_endian(&array)
    }

    fn to_be_bytes_vec(&self) -> Vec<u8> {
        let bytes = self.to_be_bytes32();
        let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(31);
        bytes[first_non_zero..].to_vec()
    }

    fn to_be_bytes32(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        bytes
    }

    fn try_as_usize(&self) -> Option<usize> {
        if self.bits() > usize::BITS as usize {
            None
        } else {
            Some(self.low_u64() as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_from_be_bytes() {
        let u = U256::from_be_bytes_vec(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(u, U256::from(0x12345678u64));
    }

    #[test]
    fn test_u256_to_be_bytes() {
        let u = U256::from(0x12345678u64);
        assert_eq!(u.to_be_bytes_vec(), vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(U256::zero().to_be_bytes_vec(), vec![0]);
        assert_eq!(u.to_be_bytes32()[28..], [0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_try_as_usize() {
        assert_eq!(U256::from(42).try_as_usize(), Some(42));
        assert_eq!(U256::MAX.try_as_usize(), None);
        assert_eq!((U256::one() << 64).try_as_usize(), None);
    }
}
