use crate::{Decoder, Encoder, RlpError};
use sandbox_types::{Address, Bytes, U256};

pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError>;
}

impl Encode for u64 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_u64(*self);
    }
}

impl Decode for u64 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_u64()
    }
}

impl Encode for U256 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_u256(*self);
    }
}

impl Decode for U256 {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_u256()
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self);
    }
}

impl Decode for Vec<u8> {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_bytes().map(|bytes| bytes.to_vec())
    }
}

impl Encode for Bytes {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_slice());
    }
}

impl Decode for Bytes {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        decoder.decode_bytes().map(Bytes::from)
    }
}

impl Encode for Address {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.encode_bytes(self.as_bytes());
    }
}

impl Decode for Address {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let bytes = decoder.decode_bytes()?;
        Address::from_slice(bytes).map_err(|_| {
            RlpError::InvalidData(format!("Invalid address length: {}", bytes.len()))
        })
    }
}

/// `None` is the empty string, as used for the `to` field of a contract creation.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => value.encode(encoder),
            None => encoder.encode_bytes(&[]),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(decoder: &mut Decoder) -> Result<Self, RlpError> {
        if decoder.is_empty_string()? {
            decoder.decode_bytes()?;
            Ok(None)
        } else {
            Ok(Some(T::decode(decoder)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{decode, encode};
    use sandbox_types::{Address, U256};

    #[test]
    fn test_optional_address() {
        let none: Option<Address> = None;
        assert_eq!(encode(&none), vec![0x80]);
        assert_eq!(decode::<Option<Address>>(&[0x80]).unwrap(), None);

        let addr = Address::from_low_u64_be(0xff);
        let encoded = encode(&Some(addr));
        assert_eq!(encoded[0], 0x94);
        assert_eq!(decode::<Option<Address>>(&encoded).unwrap(), Some(addr));
    }

    #[test]
    fn test_short_address_rejected() {
        assert!(decode::<Address>(&[0x82, 0x01, 0x02]).is_err());
    }

    #[test]
    fn test_u256_overflow_rejected() {
        let mut data = vec![0xa1];
        data.extend_from_slice(&[0x01; 33]);
        assert!(decode::<U256>(&data).is_err());
    }
}
