//! Socket-shaped facade over a [`Transport`].

use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::input::InputStream;
use crate::listeners::ConnectionListener;
use crate::output::OutputStream;
use crate::sync::with_lock;
use crate::transport::Transport;

/// Resource closed by a stream when the stream itself is closed.
pub(crate) trait Closeable: Send + Sync {
    fn close(&self) -> Result<()>;
}

/// Blocking, socket-shaped surface over one [`Transport`].
///
/// The adapter hands out one [`InputStream`] and one [`OutputStream`] while
/// the transport is connected. Whenever the transport reports a
/// disconnection both streams are destroyed: a reader blocked on the old
/// input stream fails with
/// [`AdapterError::UnexpectedEndOfStream`], and the next call to
/// [`Adapter::input_stream`] or [`Adapter::output_stream`] after
/// reconnecting returns fresh streams.
///
/// Once closed, the adapter cannot be used again.
pub struct Adapter {
    shared: Arc<AdapterShared>,
    listener: Arc<dyn ConnectionListener>,
}

struct AdapterShared {
    transport: Arc<dyn Transport>,
    config: AdapterConfig,
    /// Connection state as last reported to the watcher. It mirrors the
    /// listener's view only; the transport's own state decides whether
    /// streams may be handed out.
    connected: AtomicBool,
    /// Set by the first close so the transport is closed only once.
    closing: AtomicBool,
    streams: Mutex<Streams>,
}

#[derive(Default)]
struct Streams {
    input: Option<Arc<InputStream>>,
    output: Option<Arc<OutputStream>>,
}

/// Connection listener registered by the adapter on its transport.
struct ConnectionWatcher {
    adapter: Weak<AdapterShared>,
}

impl ConnectionListener for ConnectionWatcher {
    fn on_connected(&self) {
        if let Some(adapter) = self.adapter.upgrade() {
            let was_connected = adapter.connected.swap(true, Ordering::SeqCst);
            tracing::debug!(was_connected, "adapter observed connection");
        }
    }

    fn on_disconnected(&self) {
        if let Some(adapter) = self.adapter.upgrade() {
            let was_connected = adapter.connected.swap(false, Ordering::SeqCst);
            tracing::debug!(was_connected, "adapter observed disconnection");
            adapter.destroy_streams();
        }
    }
}

impl AdapterShared {
    fn ensure_usable(&self) -> Result<()> {
        if self.transport.is_closed() {
            return Err(AdapterError::AlreadyClosed("Adapter"));
        }
        if !self.transport.is_connected() {
            return Err(AdapterError::NotConnected);
        }
        Ok(())
    }

    fn destroy_streams(&self) {
        let streams = with_lock("Adapter.streams", &self.streams, |mut streams| {
            mem::take(&mut *streams)
        });
        if let Some(input) = streams.input {
            input.destroy();
        }
        if let Some(output) = streams.output {
            output.destroy();
        }
    }
}

impl Closeable for AdapterShared {
    fn close(&self) -> Result<()> {
        if self.transport.is_closed() || self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("closing adapter");
        if let Err(e) = self.transport.close() {
            self.closing.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        self.destroy_streams();
        Ok(())
    }
}

impl Adapter {
    /// Wrap `transport` using the default [`AdapterConfig`].
    pub fn new<T: Transport>(transport: Arc<T>) -> Self {
        Self::with_config(transport, AdapterConfig::default())
    }

    pub fn with_config<T: Transport>(transport: Arc<T>, config: AdapterConfig) -> Self {
        let transport: Arc<dyn Transport> = transport;
        let shared = Arc::new(AdapterShared {
            connected: AtomicBool::new(transport.is_connected()),
            closing: AtomicBool::new(false),
            transport,
            config,
            streams: Mutex::new(Streams::default()),
        });
        let listener: Arc<dyn ConnectionListener> = Arc::new(ConnectionWatcher {
            adapter: Arc::downgrade(&shared),
        });
        shared
            .transport
            .register_connection_listener(Arc::clone(&listener));
        Self { shared, listener }
    }

    /// Connect without a timeout.
    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        self.connect_timeout(addr, Duration::ZERO)
    }

    /// Connect through the transport. The timeout is passed on unchanged;
    /// zero means no timeout.
    pub fn connect_timeout(&self, addr: SocketAddr, timeout: Duration) -> Result<()> {
        tracing::debug!(%addr, ?timeout, "connecting");
        self.shared.transport.connect(addr, timeout)?;
        Ok(())
    }

    /// Whether the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.shared.transport.is_connected()
    }

    /// Whether the transport is closed. Closed is terminal.
    pub fn is_closed(&self) -> bool {
        self.shared.transport.is_closed()
    }

    /// The input stream of the current connection, created on first use.
    ///
    /// # Errors
    ///
    /// [`AdapterError::AlreadyClosed`] once the adapter is closed,
    /// [`AdapterError::NotConnected`] while the transport is not connected.
    pub fn input_stream(&self) -> Result<Arc<InputStream>> {
        with_lock("Adapter.streams", &self.shared.streams, |mut streams| -> Result<_> {
            self.shared.ensure_usable()?;
            let input = streams.input.get_or_insert_with(|| {
                Arc::new(InputStream::new(
                    Arc::clone(&self.shared.transport),
                    self.owner(),
                    self.shared.config.input_queue_capacity,
                ))
            });
            Ok(Arc::clone(input))
        })
    }

    /// The output stream of the current connection, created on first use.
    ///
    /// # Errors
    ///
    /// [`AdapterError::AlreadyClosed`] once the adapter is closed,
    /// [`AdapterError::NotConnected`] while the transport is not connected.
    pub fn output_stream(&self) -> Result<Arc<OutputStream>> {
        with_lock("Adapter.streams", &self.shared.streams, |mut streams| -> Result<_> {
            self.shared.ensure_usable()?;
            let output = streams.output.get_or_insert_with(|| {
                Arc::new(OutputStream::new(
                    Arc::clone(&self.shared.transport),
                    self.owner(),
                    self.shared.config.output_buffer_capacity,
                ))
            });
            Ok(Arc::clone(output))
        })
    }

    /// Close the transport, unless already closed, and destroy both
    /// streams.
    pub fn close(&self) -> Result<()> {
        self.shared.close()
    }

    /// Destroy whichever streams exist. The next request creates new ones.
    pub fn destroy_streams(&self) {
        self.shared.destroy_streams();
    }

    fn owner(&self) -> Weak<dyn Closeable> {
        let owner: Weak<AdapterShared> = Arc::downgrade(&self.shared);
        owner
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        self.shared
            .transport
            .unregister_connection_listener(&self.listener);
    }
}
