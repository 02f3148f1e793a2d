mod tools;
pub mod par;

/// Errors that can come out of compression or expansion
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("fewer than two distinct byte values")]
    InsufficientAlphabet,
    #[error("malformed tree description")]
    MalformedTree,
    #[error("compressed stream is truncated")]
    TruncatedStream,
    #[error("i/o failure: {0}")]
    IoFailure(#[from] std::io::Error)
}
