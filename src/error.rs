//! Crate error types
//!
//! The error taxonomy follows the server's handling policy: codec failures
//! (`DecodeError`) are always fatal to a connection, policy failures
//! (`StreamError`) close the connection after a grace delay, and lookup
//! misses are not errors at all (the registry treats them as no-ops).

use std::io;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Transport-level I/O failure
    Io(io::Error),
    /// Malformed or unrecognized envelope
    Decode(DecodeError),
    /// Stream policy failure (auth or validation)
    Stream(StreamError),
    /// Peer closed the connection
    ConnectionClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Decode(e) => write!(f, "decode error: {}", e),
            Error::Stream(e) => write!(f, "stream error: {}", e),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::Stream(e) => Some(e),
            Error::ConnectionClosed => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Error::Stream(e)
    }
}

/// Error decoding a binary envelope
///
/// Any of these is fatal to the connection that produced the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length buffer where an envelope was expected
    Empty,
    /// Buffer ended before the declared payload shape was complete
    UnexpectedEof,
    /// First byte is not a known message-type tag
    UnknownTag(u8),
    /// A string field was not valid UTF-8
    InvalidUtf8,
    /// Bytes left over after the payload for the declared type
    TrailingBytes(usize),
    /// Frame length prefix exceeds the allowed maximum
    FrameTooLarge(usize),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "empty envelope"),
            DecodeError::UnexpectedEof => write!(f, "unexpected end of envelope"),
            DecodeError::UnknownTag(tag) => write!(f, "unknown message tag: 0x{:02X}", tag),
            DecodeError::InvalidUtf8 => write!(f, "invalid UTF-8 in string field"),
            DecodeError::TrailingBytes(n) => write!(f, "{} trailing bytes after envelope", n),
            DecodeError::FrameTooLarge(n) => write!(f, "frame of {} bytes exceeds maximum", n),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Policy failure from a stream operation
///
/// Auth and validation failures both end the offending connection after a
/// grace delay; `kind()` distinguishes the two for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// No access-rights entry exists for the stream name
    UnknownStream(String),
    /// Password does not match the access-rights entry
    BadPassword(String),
    /// Bit depth outside the allowed 1..=32 range
    BadBitDepth(u32),
    /// Alias not bound in the calling session
    UnknownAlias(u32),
    /// WriteFrame carried no channels or no samples
    EmptyFrame,
    /// Channel count does not match the stream's channel count
    ChannelCountMismatch { expected: u16, got: usize },
    /// A channel's sample count differs from the first channel's
    RaggedChannels { channel: usize, expected: usize, got: usize },
}

/// Coarse classification of a [`StreamError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// Missing access entry or password mismatch
    Auth,
    /// Structurally valid request that violates stream rules
    Validation,
}

impl StreamError {
    /// Classify this error per the handling taxonomy
    pub fn kind(&self) -> StreamErrorKind {
        match self {
            StreamError::UnknownStream(_) | StreamError::BadPassword(_) => StreamErrorKind::Auth,
            _ => StreamErrorKind::Validation,
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::UnknownStream(name) => {
                write!(f, "no access entry for stream: {}", name)
            }
            StreamError::BadPassword(name) => write!(f, "bad password for stream: {}", name),
            StreamError::BadBitDepth(bits) => {
                write!(f, "bit depth out of range (1..=32): {}", bits)
            }
            StreamError::UnknownAlias(alias) => write!(f, "unbound alias: {}", alias),
            StreamError::EmptyFrame => write!(f, "frame has no samples"),
            StreamError::ChannelCountMismatch { expected, got } => {
                write!(f, "expected {} channels, got {}", expected, got)
            }
            StreamError::RaggedChannels { channel, expected, got } => {
                write!(
                    f,
                    "channel {} has {} samples, first channel has {}",
                    channel, got, expected
                )
            }
        }
    }
}

impl std::error::Error for StreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_kinds() {
        assert_eq!(
            StreamError::UnknownStream("a".into()).kind(),
            StreamErrorKind::Auth
        );
        assert_eq!(
            StreamError::BadPassword("a".into()).kind(),
            StreamErrorKind::Auth
        );
        assert_eq!(StreamError::BadBitDepth(0).kind(), StreamErrorKind::Validation);
        assert_eq!(StreamError::UnknownAlias(3).kind(), StreamErrorKind::Validation);
        assert_eq!(StreamError::EmptyFrame.kind(), StreamErrorKind::Validation);
    }

    #[test]
    fn test_error_display() {
        let e = Error::Decode(DecodeError::UnknownTag(0x7F));
        assert!(e.to_string().contains("0x7F"));

        let e = Error::Stream(StreamError::ChannelCountMismatch { expected: 3, got: 1 });
        assert!(e.to_string().contains("expected 3 channels"));
    }
}
