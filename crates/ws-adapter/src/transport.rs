//! The transport capability consumed by the [`Adapter`](crate::Adapter).

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::frame::Frame;
use crate::listeners::{ConnectionListener, FrameListener, ListenerRegistry};

/// Asynchronous, frame-oriented connection bridged by the adapter.
///
/// Implementations own the actual network link (handshake, URL
/// construction, frame wire encoding). They report connection changes and
/// incoming frames through the [`ListenerRegistry`] returned by
/// [`Transport::listeners`], typically from their own I/O thread.
///
/// # Thread Safety
///
/// The transport is shared between the adapter, both streams and the
/// transport's I/O thread, so every method takes `&self`.
pub trait Transport: Send + Sync + 'static {
    /// Open the connection to `addr`.
    ///
    /// A zero `timeout` means no timeout. Implementations call
    /// [`ListenerRegistry::notify_connected`] once the link is usable.
    fn connect(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()>;

    fn is_connected(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Fails if the transport is not connected or already closed.
    fn send_frame(&self, frame: Frame) -> io::Result<()>;

    /// Close the connection. Closing a closed transport is not an error.
    fn close(&self) -> io::Result<()>;

    /// The registry this transport notifies.
    fn listeners(&self) -> &ListenerRegistry;

    fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners().connection().register(listener);
    }

    fn unregister_connection_listener(&self, listener: &Arc<dyn ConnectionListener>) {
        self.listeners().connection().unregister(listener);
    }

    fn register_frame_listener(&self, listener: Arc<dyn FrameListener>) {
        self.listeners().frame().register(listener);
    }

    fn unregister_frame_listener(&self, listener: &Arc<dyn FrameListener>) {
        self.listeners().frame().unregister(listener);
    }
}
