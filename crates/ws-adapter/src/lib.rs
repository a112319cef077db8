//! Blocking byte streams over a frame-oriented transport.
//!
//! Transports such as WebSocket clients deliver data as discrete frames,
//! pushed from their own I/O thread through callbacks. This crate adapts
//! such a transport into a socket-shaped [`Adapter`] that hands out an
//! [`InputStream`] implementing [`std::io::Read`] and an [`OutputStream`]
//! implementing [`std::io::Write`], so callers can use ordinary blocking
//! reads and writes.
//!
//! # Architecture
//!
//! - [`Transport`] is the capability the adapter consumes: connect, send a
//!   [`Frame`], close, and a [`ListenerRegistry`] through which the
//!   transport reports connection changes and incoming frames.
//! - [`InputStream`] reassembles fragmented frames into messages and queues
//!   them for blocking reads.
//! - [`OutputStream`] buffers written bytes and sends them as one final
//!   frame on every flush.
//! - [`Adapter`] creates the streams lazily once connected and tears them
//!   down whenever the transport reports a disconnection.
//!
//! ```
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//!
//! use ws_adapter::{Adapter, Frame, testing::MemoryTransport};
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let adapter = Adapter::new(transport.clone());
//! adapter.connect("127.0.0.1:443".parse()?)?;
//!
//! let output = adapter.output_stream()?;
//! (&*output).write_all(b"ping")?;
//! (&*output).flush()?;
//! assert_eq!(transport.sent_frames()[0].payload().as_ref(), b"ping");
//!
//! let input = adapter.input_stream()?;
//! transport.deliver(Frame::builder().payload(&b"pong"[..]).build()?);
//! let mut buf = [0; 4];
//! (&*input).read_exact(&mut buf)?;
//! assert_eq!(&buf, b"pong");
//! # Ok::<(), eyre::Error>(())
//! ```
mod adapter;
pub mod config;
mod error;
mod frame;
mod input;
pub mod listeners;
mod output;
mod sync;
pub mod testing;
mod transport;

pub use adapter::Adapter;
pub use config::AdapterConfig;
pub use error::{AdapterError, Result};
pub use frame::{Frame, FrameBuilder};
pub use input::InputStream;
pub use listeners::{ConnectionListener, FrameListener, ListenerRegistry};
pub use output::OutputStream;
pub use transport::Transport;
