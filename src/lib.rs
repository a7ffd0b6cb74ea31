//! # bytecoders
//!
//! Lossless byte compression with two independent schemes:
//!
//! * `lz77` - sliding window longest-match coding into (distance,length,literal) triples
//! * `huffman` - static prefix-free coding from a tree built on symbol frequencies
//!
//! Both coders implement `Coder`, which turns a byte slice into a message that knows
//! its own serialized size, and turns that message back into the original bytes.
//! Each module also provides `compress` and `expand` functions that work on the
//! serialized form, these are what the command line tool uses.

pub mod lz77;
pub mod huffman;

type DYNERR = Box<dyn std::error::Error>;

/// Codec Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("file too large")]
    FileTooLarge,
    #[error("window {0} does not fit the 32 bit distance field")]
    WindowTooLarge(usize),
    #[error("lookahead {0} does not fit the 8 bit length field")]
    LookaheadTooLarge(usize),
    #[error("back reference at {position} reaches {distance} bytes behind")]
    BadReference { position: usize, distance: usize },
    #[error("message expands beyond its declared length {0}")]
    Overrun(usize),
    #[error("expanded {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("bit stream ended inside a codeword")]
    TruncatedCode,
    #[error("bit stream does not match the code tree")]
    InvalidCode
}

/// A coded message whose serialized footprint can be queried.
pub trait EncodedMessage {
    /// size in bytes the message would occupy once serialized
    fn size(&self) -> usize;
}

/// Anything that can transform bytes into an encoded message and back.
pub trait Coder {
    type Message: EncodedMessage;
    fn encode(&self,symbols: &[u8]) -> Self::Message;
    fn decode(&self,message: &Self::Message) -> Result<Vec<u8>,Error>;
}

/// Compression ratio as a percentage, values above 100 mean the data shrank.
pub fn compression_ratio(original_size: usize,coded_size: usize) -> f64 {
    100.0 * (original_size as f64 / coded_size as f64)
}

#[test]
fn ratio() {
    assert_eq!(compression_ratio(200,100),200.0);
    assert_eq!(compression_ratio(50,100),50.0);
    assert!(compression_ratio(10,0).is_infinite());
}
