//! Recursive Length Prefix codec.
//!
//! Covers what the sandbox needs: CREATE address derivation and decoding
//! legacy raw transactions.

pub mod decode;
pub mod encode;
pub mod error;
pub mod traits;

pub use decode::Decoder;
pub use encode::Encoder;
pub use error::RlpError;
pub use traits::{Decode, Encode};

pub fn encode<T: Encode>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.encode(&mut encoder);
    encoder.finish()
}

/// Decodes exactly one item; trailing bytes are an error.
pub fn decode<T: Decode>(data: &[u8]) -> Result<T, RlpError> {
    let mut decoder = Decoder::new(data);
    let value = T::decode(&mut decoder)?;
    decoder.finish()?;
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    String(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::String(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::String(_) => None,
            RlpItem::List(items) => Some(items),
        }
    }
}
