//! Blocking read side of the adapter.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::mem;
use std::sync::{Arc, Condvar, Mutex, Weak};

use bytes::Bytes;

use crate::adapter::Closeable;
use crate::error::{AdapterError, Result};
use crate::frame::Frame;
use crate::listeners::FrameListener;
use crate::sync::{lock_named, wait, with_lock};
use crate::transport::Transport;

const NAME: &str = "InputStream";

/// Blocking input stream fed by the frames of a [`Transport`].
///
/// Frames are reassembled into messages: payloads accumulate until a final
/// frame arrives, then the whole message is queued. Empty messages are
/// dropped. Reads consume one message at a time; reaching the end of a
/// message is not end-of-stream, the next read moves on to the next queued
/// message or blocks until one arrives.
///
/// A read blocked on an empty queue is released by [`InputStream::destroy`]
/// or [`InputStream::close`] and then fails with
/// [`AdapterError::UnexpectedEndOfStream`]. Only a single reader is
/// expected at a time.
///
/// Obtained from [`Adapter::input_stream`](crate::Adapter::input_stream).
/// Both `InputStream` and `&InputStream` implement [`Read`].
pub struct InputStream {
    shared: Arc<ReadShared>,
    listener: Arc<dyn FrameListener>,
    transport: Arc<dyn Transport>,
    owner: Weak<dyn Closeable>,
}

struct ReadShared {
    state: Mutex<ReadState>,
    // signalled when a message is queued and when the stream shuts
    arrived: Condvar,
}

struct ReadState {
    pending: Vec<u8>,
    queue: VecDeque<Bytes>,
    current: Option<Message>,
    closed: bool,
}

/// Read cursor over one reassembled message.
struct Message {
    data: Bytes,
    pos: usize,
    mark: usize,
}

impl Message {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            mark: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    fn skip(&mut self, n: u64) -> u64 {
        let n = usize::try_from(n).unwrap_or(usize::MAX).min(self.remaining());
        self.pos += n;
        n as u64
    }
}

impl ReadState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(AdapterError::AlreadyClosed(NAME));
        }
        Ok(())
    }

    fn push(&mut self, frame: &Frame) -> bool {
        self.pending.extend_from_slice(frame.payload());
        if !frame.is_final() || self.pending.is_empty() {
            return false;
        }
        let data = Bytes::from(mem::take(&mut self.pending));
        tracing::trace!(len = data.len(), "message completed");
        if self.current.is_none() {
            self.current = Some(Message::new(data));
        } else {
            self.queue.push_back(data);
        }
        true
    }

    /// Read from the current message, moving on to the next queued one
    /// once it is exhausted. `None` if nothing is available.
    fn read_current(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.current.as_ref().is_none_or(|m| m.remaining() == 0) {
            self.current = self.queue.pop_front().map(Message::new);
        }
        self.current.as_mut().map(|m| m.read(buf))
    }

    /// Mark closed and drop all buffered data. Returns whether the state
    /// was open before.
    fn shut(&mut self) -> bool {
        let was_open = !self.closed;
        self.closed = true;
        self.current = None;
        self.queue.clear();
        self.pending = Vec::new();
        was_open
    }
}

impl FrameListener for ReadShared {
    fn on_frame_received(&self, frame: &Frame) {
        with_lock(NAME, &self.state, |mut state| {
            if state.closed {
                return;
            }
            if state.push(frame) {
                self.arrived.notify_one();
            }
        });
    }
}

impl ReadShared {
    fn shut(&self) -> bool {
        let was_open = with_lock(NAME, &self.state, |mut state| state.shut());
        self.arrived.notify_all();
        was_open
    }
}

impl InputStream {
    /// Create a stream and register it as a frame listener on `transport`.
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        owner: Weak<dyn Closeable>,
        queue_capacity: usize,
    ) -> Self {
        let shared = Arc::new(ReadShared {
            state: Mutex::new(ReadState {
                pending: Vec::new(),
                queue: VecDeque::with_capacity(queue_capacity),
                current: None,
                closed: false,
            }),
            arrived: Condvar::new(),
        });
        let listener: Arc<dyn FrameListener> = shared.clone();
        transport.register_frame_listener(Arc::clone(&listener));
        tracing::debug!("input stream created");
        Self {
            shared,
            listener,
            transport,
            owner,
        }
    }

    /// Read a single byte, blocking until one is available.
    ///
    /// # Errors
    ///
    /// [`AdapterError::AlreadyClosed`] if the stream is closed,
    /// [`AdapterError::UnexpectedEndOfStream`] if the stream was torn down
    /// while waiting.
    pub fn read_byte(&self) -> Result<u8> {
        let mut byte = [0];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    /// Read up to `buf.len()` bytes of the current message, blocking until
    /// a message is available. Never returns 0 for a non-empty `buf`.
    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = lock_named(NAME, &self.shared.state);
        state.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(n) = state.read_current(buf) {
                return Ok(n);
            }
            if state.closed {
                tracing::debug!("blocked read released without data");
                return Err(AdapterError::UnexpectedEndOfStream);
            }
            tracing::trace!("waiting for next message");
            state = wait(&self.shared.arrived, state);
        }
    }

    /// Number of unread bytes in the current message, without blocking.
    pub fn available(&self) -> Result<usize> {
        with_lock(NAME, &self.shared.state, |state| -> Result<usize> {
            state.ensure_open()?;
            Ok(state.current.as_ref().map_or(0, Message::remaining))
        })
    }

    /// Skip up to `n` bytes of the current message, without blocking.
    ///
    /// Returns the number of bytes skipped, 0 when there is no current
    /// message.
    pub fn skip(&self, n: u64) -> Result<u64> {
        with_lock(NAME, &self.shared.state, |mut state| -> Result<u64> {
            state.ensure_open()?;
            Ok(state.current.as_mut().map_or(0, |m| m.skip(n)))
        })
    }

    /// Remember the position within the current message.
    ///
    /// Without a current message this does nothing.
    pub fn mark(&self) -> Result<()> {
        with_lock(NAME, &self.shared.state, |mut state| -> Result<()> {
            state.ensure_open()?;
            if let Some(message) = state.current.as_mut() {
                message.mark = message.pos;
            }
            Ok(())
        })
    }

    /// Rewind the current message to its mark, or to its start if it was
    /// never marked.
    ///
    /// Without a current message this does nothing.
    pub fn reset(&self) -> Result<()> {
        with_lock(NAME, &self.shared.state, |mut state| -> Result<()> {
            state.ensure_open()?;
            if let Some(message) = state.current.as_mut() {
                message.pos = message.mark;
            }
            Ok(())
        })
    }

    /// Close the stream and the adapter that owns it.
    ///
    /// Releases a blocked reader. The owner is closed only by the first
    /// call; later calls do nothing. The stream stays registered with the
    /// transport until [`InputStream::destroy`], which the adapter invokes
    /// as part of its own close.
    pub fn close(&self) -> Result<()> {
        if !self.shared.shut() {
            return Ok(());
        }
        tracing::debug!("input stream closed");
        match self.owner.upgrade() {
            Some(owner) => owner.close(),
            None => Ok(()),
        }
    }

    /// Detach from the transport, release a blocked reader and mark the
    /// stream closed. Safe to call any number of times.
    pub fn destroy(&self) {
        self.transport.unregister_frame_listener(&self.listener);
        self.shared.shut();
        tracing::debug!("input stream destroyed");
    }

    /// Whether the stream was closed or destroyed.
    pub fn is_closed(&self) -> bool {
        with_lock(NAME, &self.shared.state, |state| state.closed)
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        self.transport.unregister_frame_listener(&self.listener);
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl Read for &InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}
