//! Buffered write side of the adapter.

use std::io::{self, Write};
use std::mem;
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;

use crate::adapter::Closeable;
use crate::error::{AdapterError, Result};
use crate::frame::Frame;
use crate::sync::with_lock;
use crate::transport::Transport;

const NAME: &str = "OutputStream";

/// Output stream that sends everything written between two flushes as one
/// final [`Frame`].
///
/// Writes only append to an in-memory buffer; nothing reaches the transport
/// until [`flush`](Write::flush). Closing the stream **discards** bytes that
/// were written but not flushed. Only a single writer is expected at a time.
///
/// Obtained from [`Adapter::output_stream`](crate::Adapter::output_stream).
/// Both `OutputStream` and `&OutputStream` implement [`Write`].
pub struct OutputStream {
    state: Mutex<WriteState>,
    capacity: usize,
    transport: Arc<dyn Transport>,
    owner: Weak<dyn Closeable>,
}

struct WriteState {
    // None once destroyed
    buffer: Option<Vec<u8>>,
    closed: bool,
}

impl WriteState {
    fn buffer(&mut self) -> Result<&mut Vec<u8>> {
        match (self.closed, self.buffer.as_mut()) {
            (false, Some(buffer)) => Ok(buffer),
            _ => Err(AdapterError::AlreadyClosed(NAME)),
        }
    }
}

impl OutputStream {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        owner: Weak<dyn Closeable>,
        capacity: usize,
    ) -> Self {
        tracing::debug!("output stream created");
        Self {
            state: Mutex::new(WriteState {
                buffer: Some(Vec::with_capacity(capacity)),
                closed: false,
            }),
            capacity,
            transport,
            owner,
        }
    }

    /// Append a single byte to the buffer.
    pub fn write_byte(&self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    /// Append `bytes` to the buffer. Nothing is sent until flushed.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        with_lock(NAME, &self.state, |mut state| -> Result<()> {
            state.buffer()?.extend_from_slice(bytes);
            Ok(())
        })
    }

    /// Send the buffered bytes as one final frame and clear the buffer.
    ///
    /// With an empty buffer the transport is not touched. If sending fails
    /// the bytes are put back in front of the buffer and the transport's
    /// error is returned unchanged.
    ///
    /// The lock is not held while the transport sends, so a transport may
    /// report a disconnection from inside `send_frame`.
    pub fn flush_frame(&self) -> Result<()> {
        let taken = with_lock(NAME, &self.state, |mut state| -> Result<Option<Bytes>> {
            let buffer = state.buffer()?;
            if buffer.is_empty() {
                return Ok(None);
            }
            let payload = mem::replace(buffer, Vec::with_capacity(self.capacity));
            Ok(Some(Bytes::from(payload)))
        })?;
        let Some(payload) = taken else {
            return Ok(());
        };

        tracing::trace!(len = payload.len(), "sending frame");
        let frame = Frame::new(payload.clone(), true);
        if let Err(e) = self.transport.send_frame(frame) {
            with_lock(NAME, &self.state, |mut state| {
                if let Ok(buffer) = state.buffer() {
                    let mut restored = payload.to_vec();
                    restored.extend_from_slice(buffer);
                    *buffer = restored;
                }
            });
            return Err(e.into());
        }
        Ok(())
    }

    /// Close the stream and the adapter that owns it.
    ///
    /// Unflushed bytes are discarded, not sent. The owner is closed only by
    /// the first call; later calls do nothing.
    pub fn close(&self) -> Result<()> {
        let was_open = with_lock(NAME, &self.state, |mut state| {
            if state.closed {
                return false;
            }
            if let Some(buffer) = state.buffer.as_mut() {
                if !buffer.is_empty() {
                    tracing::debug!(len = buffer.len(), "discarding unflushed bytes");
                }
                buffer.clear();
            }
            state.closed = true;
            true
        });
        if !was_open {
            return Ok(());
        }
        tracing::debug!("output stream closed");
        match self.owner.upgrade() {
            Some(owner) => owner.close(),
            None => Ok(()),
        }
    }

    /// Drop the buffer and mark the stream closed. Safe to call any number
    /// of times.
    pub fn destroy(&self) {
        with_lock(NAME, &self.state, |mut state| {
            drop(mem::take(&mut state.buffer));
            state.closed = true;
        });
        tracing::debug!("output stream destroyed");
    }

    /// Whether the stream was closed or destroyed.
    pub fn is_closed(&self) -> bool {
        with_lock(NAME, &self.state, |state| state.closed)
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_frame().map_err(io::Error::from)
    }
}

impl Write for &OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_frame().map_err(io::Error::from)
    }
}
