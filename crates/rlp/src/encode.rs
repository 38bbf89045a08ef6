use crate::traits::Encode;
use bytes::BytesMut;
use sandbox_types::U256;

/// Append-only RLP writer.
pub struct Encoder {
    buffer: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            buffer: BytesMut::new(),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        match bytes.len() {
            1 if bytes[0] < 0x80 => self.buffer.extend_from_slice(bytes),
            len => {
                self.write_header(0x80, len);
                self.buffer.extend_from_slice(bytes);
            }
        }
    }

    /// Homogeneous list.
    pub fn encode_list<T: Encode>(&mut self, items: &[T]) {
        self.encode_list_with(|list| {
            for item in items {
                item.encode(list);
            }
        });
    }

    /// List whose items are written by `f`; items may have different types.
    pub fn encode_list_with<F: FnOnce(&mut Encoder)>(&mut self, f: F) {
        let mut list_encoder = Encoder::new();
        f(&mut list_encoder);
        let payload = list_encoder.finish();
        self.write_header(0xc0, payload.len());
        self.buffer.extend_from_slice(&payload);
    }

    pub fn encode_u64(&mut self, value: u64) {
        let bytes = value.to_be_bytes();
        let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        self.encode_bytes(&bytes[first_non_zero..]);
    }

    pub fn encode_u256(&mut self, value: U256) {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        self.encode_bytes(&bytes[first_non_zero..]);
    }

    fn write_header(&mut self, offset: u8, len: usize) {
        if len < 56 {
            self.buffer.extend_from_slice(&[offset + len as u8]);
        } else {
            let len_bytes = encode_length(len);
            self.buffer.extend_from_slice(&[offset + 55 + len_bytes.len() as u8]);
            self.buffer.extend_from_slice(&len_bytes);
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = (len as u64).to_be_bytes();
    let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[first_non_zero..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_byte() {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[0x00]);
        assert_eq!(encoder.finish(), vec![0x00]);

        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[0x80]);
        assert_eq!(encoder.finish(), vec![0x81, 0x80]);
    }

    #[test]
    fn test_encode_string() {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(b"dog");
        assert_eq!(encoder.finish(), vec![0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn test_encode_long_string() {
        let data = vec![0xaa; 60];
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&data);
        let out = encoder.finish();
        assert_eq!(&out[..2], &[0xb8, 60]);
        assert_eq!(out.len(), 62);
    }

    #[test]
    fn test_encode_list() {
        let mut encoder = Encoder::new();
        encoder.encode_list(&[b"cat".to_vec(), b"dog".to_vec()]);
        assert_eq!(
            encoder.finish(),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );

        let mut encoder = Encoder::new();
        encoder.encode_list::<Vec<u8>>(&[]);
        assert_eq!(encoder.finish(), vec![0xc0]);
    }

    #[test]
    fn test_encode_mixed_list() {
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|list| {
            list.encode_bytes(b"cat");
            list.encode_u64(1024);
        });
        assert_eq!(
            encoder.finish(),
            vec![0xc7, 0x83, b'c', b'a', b't', 0x82, 0x04, 0x00]
        );
    }

    #[test]
    fn test_encode_integers() {
        let mut encoder = Encoder::new();
        encoder.encode_u64(0);
        encoder.encode_u64(15);
        encoder.encode_u256(U256::from(1024));
        assert_eq!(encoder.finish(), vec![0x80, 0x0f, 0x82, 0x04, 0x00]);
    }
}
