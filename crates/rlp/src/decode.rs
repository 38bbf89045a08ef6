use crate::traits::Decode;
use crate::{RlpError, RlpItem};
use sandbox_types::U256;

/// Cursor over an RLP byte stream.
pub struct Decoder<'a> {
    data: &'a [u8],
    position: usize,
}

struct Header {
    offset: usize,
    len: usize,
    is_list: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder { data, position: 0 }
    }

    pub fn decode_bytes(&mut self) -> Result<&'a [u8], RlpError> {
        let header = self.decode_header()?;
        if header.is_list {
            return Err(RlpError::ExpectedString);
        }
        let payload = self.take_payload(&header)?;
        if header.offset == 1 && header.len == 1 && payload[0] < 0x80 {
            return Err(RlpError::InvalidData(
                "single byte below 0x80 must not carry a prefix".to_string(),
            ));
        }
        Ok(payload)
    }

    /// Enters a list and returns a decoder scoped to its payload.
    pub fn list(&mut self) -> Result<Decoder<'a>, RlpError> {
        let header = self.decode_header()?;
        if !header.is_list {
            return Err(RlpError::ExpectedList);
        }
        let payload = self.take_payload(&header)?;
        Ok(Decoder::new(payload))
    }

    pub fn decode_list<T: Decode>(&mut self) -> Result<Vec<T>, RlpError> {
        let mut list = self.list()?;
        let mut items = Vec::new();
        while !list.is_finished() {
            items.push(T::decode(&mut list)?);
        }
        Ok(items)
    }

    pub fn decode_item(&mut self) -> Result<RlpItem, RlpError> {
        if self.is_list()? {
            let mut list = self.list()?;
            let mut items = Vec::new();
            while !list.is_finished() {
                items.push(list.decode_item()?);
            }
            Ok(RlpItem::List(items))
        } else {
            Ok(RlpItem::String(self.decode_bytes()?.to_vec()))
        }
    }

    pub fn decode_u64(&mut self) -> Result<u64, RlpError> {
        let bytes = self.decode_integer_bytes(8)?;
        let mut array = [0u8; 8];
        array[8 - bytes.len()..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(array))
    }

    pub fn decode_u256(&mut self) -> Result<U256, RlpError> {
        let bytes = self.decode_integer_bytes(32)?;
        Ok(U256::from_big_endian(bytes))
    }

    pub fn is_empty_string(&self) -> Result<bool, RlpError> {
        self.peek().map(|prefix| prefix == 0x80)
    }

    pub fn is_list(&self) -> Result<bool, RlpError> {
        self.peek().map(|prefix| prefix >= 0xc0)
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Fails if anything is left after the decoded items.
    pub fn finish(&self) -> Result<(), RlpError> {
        match self.data.len().saturating_sub(self.position) {
            0 => Ok(()),
            rest => Err(RlpError::TrailingBytes(rest)),
        }
    }

    fn decode_integer_bytes(&mut self, max_len: usize) -> Result<&'a [u8], RlpError> {
        let bytes = self.decode_bytes()?;
        if bytes.len() > max_len {
            return Err(RlpError::IntegerOverflow);
        }
        if bytes.first() == Some(&0) {
            return Err(RlpError::LeadingZeros);
        }
        Ok(bytes)
    }

    fn peek(&self) -> Result<u8, RlpError> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(RlpError::UnexpectedEof)
    }

    fn take_payload(&mut self, header: &Header) -> Result<&'a [u8], RlpError> {
        let start = self.position + header.offset;
        let end = start
            .checked_add(header.len)
            .ok_or(RlpError::IntegerOverflow)?;
        if end > self.data.len() {
            return Err(RlpError::UnexpectedEof);
        }
        self.position = end;
        Ok(&self.data[start..end])
    }

    fn decode_header(&self) -> Result<Header, RlpError> {
        let prefix = self.peek()?;

        let header = match prefix {
            0x00..=0x7f => Header { offset: 0, len: 1, is_list: false },
            0x80..=0xb7 => Header {
                offset: 1,
                len: (prefix - 0x80) as usize,
                is_list: false,
            },
            0xb8..=0xbf => {
                let len_of_len = (prefix - 0xb7) as usize;
                Header {
                    offset: 1 + len_of_len,
                    len: self.long_length(len_of_len)?,
                    is_list: false,
                }
            }
            0xc0..=0xf7 => Header {
                offset: 1,
                len: (prefix - 0xc0) as usize,
                is_list: true,
            },
            0xf8..=0xff => {
                let len_of_len = (prefix - 0xf7) as usize;
                Header {
                    offset: 1 + len_of_len,
                    len: self.long_length(len_of_len)?,
                    is_list: true,
                }
            }
        };
        Ok(header)
    }

    fn long_length(&self, len_of_len: usize) -> Result<usize, RlpError> {
        let start = self.position + 1;
        let bytes = self
            .data
            .get(start..start + len_of_len)
            .ok_or(RlpError::UnexpectedEof)?;
        if bytes[0] == 0 {
            return Err(RlpError::LeadingZeros);
        }

        let mut len = 0usize;
        for &byte in bytes {
            len = len
                .checked_shl(8)
                .and_then(|l| l.checked_add(byte as usize))
                .ok_or(RlpError::IntegerOverflow)?;
        }
        if len < 56 {
            return Err(RlpError::InvalidData("non-canonical long length".to_string()));
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_byte() {
        let mut decoder = Decoder::new(&[0x00]);
        assert_eq!(decoder.decode_bytes().unwrap(), &[0x00]);

        let mut decoder = Decoder::new(&[0x81, 0x05]);
        assert!(decoder.decode_bytes().is_err());
    }

    #[test]
    fn test_decode_string() {
        let mut decoder = Decoder::new(&[0x83, b'd', b'o', b'g']);
        assert_eq!(decoder.decode_bytes().unwrap(), b"dog");
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_decode_list() {
        let data = [0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g'];
        let mut decoder = Decoder::new(&data);
        let items: Vec<Vec<u8>> = decoder.decode_list().unwrap();
        assert_eq!(items, vec![b"cat".to_vec(), b"dog".to_vec()]);
    }

    #[test]
    fn test_decode_nested_item() {
        // [[], [[]]]
        let mut decoder = Decoder::new(&[0xc3, 0xc0, 0xc1, 0xc0]);
        let item = decoder.decode_item().unwrap();
        assert_eq!(
            item,
            RlpItem::List(vec![
                RlpItem::List(vec![]),
                RlpItem::List(vec![RlpItem::List(vec![])]),
            ])
        );
    }

    #[test]
    fn test_decode_integers() {
        let mut decoder = Decoder::new(&[0x80, 0x0f, 0x82, 0x04, 0x00]);
        assert_eq!(decoder.decode_u64().unwrap(), 0);
        assert_eq!(decoder.decode_u64().unwrap(), 15);
        assert_eq!(decoder.decode_u256().unwrap(), U256::from(1024));

        let mut decoder = Decoder::new(&[0x82, 0x00, 0x01]);
        assert_eq!(decoder.decode_u64(), Err(RlpError::LeadingZeros));
    }

    #[test]
    fn test_truncated_input() {
        let mut decoder = Decoder::new(&[0x83, b'd', b'o']);
        assert_eq!(decoder.decode_bytes(), Err(RlpError::UnexpectedEof));

        let mut decoder = Decoder::new(&[]);
        assert_eq!(decoder.decode_bytes(), Err(RlpError::UnexpectedEof));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut decoder = Decoder::new(&[0x01, 0x02]);
        decoder.decode_bytes().unwrap();
        assert_eq!(decoder.finish(), Err(RlpError::TrailingBytes(1)));
    }
}
