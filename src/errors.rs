use thiserror::Error;

/// Errors that can occur when reading or writing PLY files.
///
/// Every failure is terminal for the operation that produced it;
/// no recovery is attempted inside the library.
#[derive(Debug, Error)]
pub enum PlyError {
    /// An underlying byte source or sink failure, surfaced verbatim.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The header is malformed: missing magic, unknown keyword or type
    /// spelling, structural content before `format`, malformed count.
    #[error("format error: {0}")]
    Format(String),
    /// A request or authored attachment disagrees with the header:
    /// unknown element or property, mixed types in a request group,
    /// duplicate binding, buffer of the wrong size.
    #[error("argument error: {0}")]
    Argument(String),
    /// The payload disagrees with the parsed header: premature end of
    /// data, a list length outside the promised fixed size, a negative
    /// or non-integer list length prefix.
    #[error("payload error: {0}")]
    Payload(String),
}

/// A specialized `Result` type for PLY operations.
pub type PlyResult<T> = Result<T, PlyError>;
