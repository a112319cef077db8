//! Testing utilities.
//!
//! [`MemoryTransport`] stands in for a real frame-oriented connection so
//! code using the [`Adapter`](crate::Adapter) can be exercised without a
//! network.

mod memory;

pub use memory::MemoryTransport;

use bytes::Bytes;

use crate::frame::Frame;

/// Split `payload` into frames of at most `chunk_size` bytes, only the last
/// of which is final.
///
/// An empty payload yields a single empty final frame.
///
/// # Example
///
/// ```
/// use ws_adapter::testing::fragment;
///
/// let frames = fragment(b"hello", 2);
/// assert_eq!(frames.len(), 3);
/// assert!(!frames[0].is_final());
/// assert!(frames[2].is_final());
/// ```
pub fn fragment(payload: &[u8], chunk_size: usize) -> Vec<Frame> {
    if payload.is_empty() {
        return vec![Frame::empty()];
    }
    let chunks: Vec<&[u8]> = payload.chunks(chunk_size.max(1)).collect();
    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| Frame::new(Bytes::copy_from_slice(chunk), i == last))
        .collect()
}
