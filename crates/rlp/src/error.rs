use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Invalid RLP data: {0}")]
    InvalidData(String),

    #[error("Integer overflow")]
    IntegerOverflow,

    #[error("Leading zeros in integer")]
    LeadingZeros,

    #[error("Expected a list, found a string")]
    ExpectedList,

    #[error("Expected a string, found a list")]
    ExpectedString,

    #[error("{0} trailing bytes after item")]
    TrailingBytes(usize),
}
