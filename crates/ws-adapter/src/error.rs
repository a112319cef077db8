//! Error types for the adapter and its streams.

use std::io;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors raised by the adapter, its streams and frame construction.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The named resource has already been closed.
    #[error("{0} has been already closed")]
    AlreadyClosed(&'static str),

    /// I/O was attempted while the transport is not connected.
    #[error("not connected")]
    NotConnected,

    /// A blocked read was released without any data becoming available.
    #[error("unexpected end of the stream")]
    UnexpectedEndOfStream,

    /// A frame could not be built.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// The transport failed; the error is passed through unchanged.
    #[error(transparent)]
    TransportFailure(#[from] io::Error),
}

impl From<AdapterError> for io::Error {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::TransportFailure(e) => e,
            AdapterError::NotConnected => io::Error::new(io::ErrorKind::NotConnected, err),
            AdapterError::UnexpectedEndOfStream => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err)
            }
            AdapterError::InvalidFrame(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            AdapterError::AlreadyClosed(_) => io::Error::other(err),
        }
    }
}
