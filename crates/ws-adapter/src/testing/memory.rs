//! In-memory transport for testing

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::frame::Frame;
use crate::listeners::ListenerRegistry;
use crate::sync::with_lock;
use crate::transport::Transport;

/// In-memory [`Transport`] for testing
///
/// Nothing leaves the process: sent frames are collected on a channel, and
/// the test plays the role of the transport's I/O thread by calling
/// [`deliver`](MemoryTransport::deliver) and
/// [`drop_connection`](MemoryTransport::drop_connection), which notify the
/// registered listeners on the calling thread.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use ws_adapter::{Adapter, Frame, testing::MemoryTransport};
///
/// let transport = Arc::new(MemoryTransport::new());
/// let adapter = Adapter::new(transport.clone());
/// adapter.connect("127.0.0.1:443".parse()?)?;
///
/// let input = adapter.input_stream()?;
/// transport.deliver(Frame::builder().payload(vec![1, 2, 3]).build()?);
/// assert_eq!(input.available()?, 3);
/// # Ok::<(), eyre::Error>(())
/// ```
pub struct MemoryTransport {
    listeners: ListenerRegistry,
    connected: AtomicBool,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    disconnect_on_send: AtomicBool,
    close_calls: AtomicUsize,
    connects: Mutex<Vec<(SocketAddr, Duration)>>,
    sent_tx: Sender<Frame>,
    sent_rx: Receiver<Frame>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        let (sent_tx, sent_rx) = crossbeam_channel::unbounded();
        Self {
            listeners: ListenerRegistry::new(),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            disconnect_on_send: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            connects: Mutex::new(Vec::new()),
            sent_tx,
            sent_rx,
        }
    }
}

impl MemoryTransport {
    /// Create an unconnected, open transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame to the frame listeners, as if read from the network.
    pub fn deliver(&self, frame: Frame) {
        self.listeners.notify_frame_received(&frame);
    }

    /// Lose the connection without closing the transport. It can be
    /// connected again afterwards.
    pub fn drop_connection(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.listeners.notify_disconnected();
        }
    }

    /// Make every following `send_frame` fail with a broken pipe.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make every following `send_frame` lose the connection, notifying
    /// the disconnection on the sending thread, and fail with a broken
    /// pipe. This is how a client usually learns the peer is gone.
    pub fn disconnect_on_send(&self, disconnect: bool) {
        self.disconnect_on_send.store(disconnect, Ordering::SeqCst);
    }

    /// Frames sent since the previous call.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent_rx.try_iter().collect()
    }

    /// Receiver of sent frames, for blocking on the next one.
    pub fn sent_receiver(&self) -> Receiver<Frame> {
        self.sent_rx.clone()
    }

    /// How often `close` has been called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Arguments of every successful `connect` call.
    pub fn connects(&self) -> Vec<(SocketAddr, Duration)> {
        with_lock("MemoryTransport.connects", &self.connects, |connects| {
            connects.clone()
        })
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::other("transport closed"));
        }
        with_lock("MemoryTransport.connects", &self.connects, |mut connects| {
            connects.push((addr, timeout));
        });
        if !self.connected.swap(true, Ordering::SeqCst) {
            self.listeners.notify_connected();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn send_frame(&self, frame: Frame) -> io::Result<()> {
        if self.disconnect_on_send.load(Ordering::SeqCst) {
            self.drop_connection();
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection lost"));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "send failed"));
        }
        if self.is_closed() || !self.is_connected() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        }
        self.sent_tx
            .send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel disconnected"))
    }

    fn close(&self) -> io::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            self.listeners.notify_disconnected();
        }
        Ok(())
    }

    fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }
}
