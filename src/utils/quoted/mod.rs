pub use quoted::*;
pub use rfc_2047::*;

mod quoted;
mod rfc_2047;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum QuotedStringError {
    #[display(fmt = "input is empty")]
    InputEmpty,
    #[display(fmt = "quoted string must start with quote")]
    FirstCharIsNotQuote,
    #[display(fmt = "quoted string is not terminated")]
    UnexpectedEof,
    #[display(fmt = "unknown encoded word encoding")]
    InvalidEncoding,
    #[display(fmt = "encoded word payload could not be decoded")]
    DecodingFailed,
    #[display(fmt = "encoded word contains forbidden characters")]
    InvalidEncodedWord,
    #[display(fmt = "invalid character at byte {}", byte_offset)]
    InvalidCharacter { byte_offset: usize },
}
