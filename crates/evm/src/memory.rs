use sandbox_types::{UintExt, U256};

/// Byte-addressed frame memory. Callers expand it (and pay for it) before
/// every access, so reads and writes here never go out of bounds.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Size in 32-byte words.
    pub fn words(&self) -> u64 {
        (self.data.len() / 32) as u64
    }

    pub fn resize_words(&mut self, words: u64) {
        let new_size = words as usize * 32;
        if new_size > self.data.len() {
            self.data.resize(new_size, 0);
        }
    }

    pub fn slice(&self, offset: usize, size: usize) -> &[u8] {
        if size == 0 {
            return &[];
        }
        &self.data[offset..offset + size]
    }

    pub fn get_u256(&self, offset: usize) -> U256 {
        U256::from_big_endian(self.slice(offset, 32))
    }

    pub fn set(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Writes `size` bytes taken from `data` at `data_offset`, zero-padding past its end.
    pub fn set_padded(&mut self, offset: usize, data: &[u8], data_offset: U256, size: usize) {
        if size == 0 {
            return;
        }
        let target = &mut self.data[offset..offset + size];
        let start = match data_offset.try_as_usize() {
            Some(start) if start < data.len() => start,
            _ => {
                target.fill(0);
                return;
            }
        };
        let available = (data.len() - start).min(size);
        target[..available].copy_from_slice(&data[start..start + available]);
        target[available..].fill(0);
    }

    pub fn set_u256(&mut self, offset: usize, value: U256) {
        let mut data = [0u8; 32];
        value.to_big_endian(&mut data);
        self.set(offset, &data);
    }

    pub fn set_byte(&mut self, offset: usize, byte: u8) {
        self.data[offset] = byte;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_resize() {
        let mut memory = Memory::new();
        memory.resize_words(1);
        assert_eq!(memory.len(), 32);
        assert_eq!(memory.words(), 1);
        memory.resize_words(0);
        assert_eq!(memory.len(), 32);
    }

    #[test]
    fn test_memory_set_get() {
        let mut memory = Memory::new();
        memory.resize_words(1);
        memory.set(10, &[1, 2, 3, 4, 5]);
        assert_eq!(memory.slice(8, 9), &[0, 0, 1, 2, 3, 4, 5, 0, 0]);
        assert!(memory.slice(40, 0).is_empty());
    }

    #[test]
    fn test_memory_u256() {
        let mut memory = Memory::new();
        memory.resize_words(2);
        let value = U256::from(0x1234567890abcdef_u64);
        memory.set_u256(3, value);
        assert_eq!(memory.get_u256(3), value);
    }

    #[test]
    fn test_set_padded() {
        let mut memory = Memory::new();
        memory.resize_words(1);
        memory.set(0, &[0xff; 32]);

        memory.set_padded(0, &[1, 2, 3], U256::from(1), 4);
        assert_eq!(memory.slice(0, 5), &[2, 3, 0, 0, 0xff]);

        memory.set_padded(0, &[1, 2, 3], U256::MAX, 2);
        assert_eq!(memory.slice(0, 3), &[0, 0, 0]);
    }
}
