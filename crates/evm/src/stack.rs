use crate::error::{EvmError, EvmResult};
use sandbox_types::{Address, U256};

pub const STACK_LIMIT: usize = 1024;

/// Word stack of one frame. Depth 0 is the top.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    words: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            words: Vec::with_capacity(32),
        }
    }

    pub fn push(&mut self, word: U256) -> EvmResult<()> {
        if self.words.len() == STACK_LIMIT {
            return Err(EvmError::StackOverflow);
        }
        self.words.push(word);
        Ok(())
    }

    pub fn push_bool(&mut self, flag: bool) -> EvmResult<()> {
        self.push(U256::from(flag as u8))
    }

    pub fn pop(&mut self) -> EvmResult<U256> {
        self.words.pop().ok_or(EvmError::StackUnderflow)
    }

    /// Pops `N` words, top first.
    pub fn popn<const N: usize>(&mut self) -> EvmResult<[U256; N]> {
        self.require(N)?;
        let mut out = [U256::zero(); N];
        for slot in out.iter_mut() {
            *slot = self.pop()?;
        }
        Ok(out)
    }

    /// Pops a word and keeps its low 20 bytes.
    pub fn pop_address(&mut self) -> EvmResult<Address> {
        self.pop().map(Address::from_word)
    }

    fn position(&self, depth: usize) -> EvmResult<usize> {
        self.words
            .len()
            .checked_sub(depth + 1)
            .ok_or(EvmError::StackUnderflow)
    }

    pub fn peek(&self, depth: usize) -> EvmResult<&U256> {
        let at = self.position(depth)?;
        Ok(&self.words[at])
    }

    /// SWAPn: exchanges the top with the word at `depth`.
    pub fn swap(&mut self, depth: usize) -> EvmResult<()> {
        let at = self.position(depth)?;
        let top = self.words.len() - 1;
        self.words.swap(top, at);
        Ok(())
    }

    /// DUPn: pushes a copy of the word at `depth`.
    pub fn dup(&mut self, depth: usize) -> EvmResult<()> {
        let word = *self.peek(depth)?;
        self.push(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn require(&self, n: usize) -> EvmResult<()> {
        if self.words.len() < n {
            return Err(EvmError::StackUnderflow);
        }
        Ok(())
    }

    pub fn limit_check(&self, n: usize) -> EvmResult<()> {
        if self.words.len() + n > STACK_LIMIT {
            return Err(EvmError::StackOverflow);
        }
        Ok(())
    }
}
