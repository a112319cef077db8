//! Integration tests driving the adapter through the in-memory transport.
//!
//! The test thread plays the caller, spawned threads play the transport's
//! I/O thread delivering frames.

use std::io::{self, BufRead, BufReader, IsTerminal, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;
use ws_adapter::testing::{MemoryTransport, fragment};
use ws_adapter::{Adapter, AdapterError, Frame, ListenerRegistry, Transport};

#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    let _ = color_eyre::install();
}

const TIMEOUT: Duration = Duration::from_secs(5);

fn addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9001))
}

fn connected() -> Result<(Arc<MemoryTransport>, Adapter)> {
    let transport = Arc::new(MemoryTransport::new());
    let adapter = Adapter::new(transport.clone());
    adapter.connect(addr()).wrap_err("connecting adapter")?;
    Ok((transport, adapter))
}

/// Echo every sent frame back to the adapter, split into 3-byte fragments.
fn spawn_echo(transport: Arc<MemoryTransport>, messages: usize) -> thread::JoinHandle<()> {
    let sent = transport.sent_receiver();
    thread::spawn(move || {
        for _ in 0..messages {
            let Ok(frame) = sent.recv_timeout(TIMEOUT) else {
                return;
            };
            for piece in fragment(frame.payload(), 3) {
                transport.deliver(piece);
            }
        }
    })
}

#[test]
fn test_echo_round_trip() -> Result<()> {
    let (transport, adapter) = connected()?;
    let echo = spawn_echo(transport.clone(), 2);

    let output = adapter.output_stream()?;
    let input = adapter.input_stream()?;

    (&*output).write_all(b"hello over frames")?;
    (&*output).flush()?;

    let mut buf = vec![0; 17];
    (&*input).read_exact(&mut buf)?;
    assert_eq!(&buf, b"hello over frames");

    (&*output).write_all(b"again")?;
    (&*output).flush()?;
    let mut buf = vec![0; 5];
    (&*input).read_exact(&mut buf)?;
    assert_eq!(&buf, b"again");

    echo.join().map_err(|_| eyre::eyre!("echo thread panicked"))?;
    Ok(())
}

#[test]
fn test_lines_span_messages() -> Result<()> {
    let (transport, adapter) = connected()?;
    let input = adapter.input_stream()?;

    for frame in fragment(b"first li", 4) {
        transport.deliver(frame);
    }
    transport.deliver(Frame::builder().payload(&b"ne\nsecond line\n"[..]).build()?);

    let mut reader = BufReader::new(&*input);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    assert_eq!(line, "first line\n");
    line.clear();
    reader.read_line(&mut line)?;
    assert_eq!(line, "second line\n");
    Ok(())
}

#[test]
fn test_reassembly_for_any_fragmentation() -> Result<()> {
    let payload: Vec<u8> = (0..=255).collect();

    for chunk_size in [1, 2, 7, 64, 255, 256, 1000] {
        let (transport, adapter) = connected()?;
        let input = adapter.input_stream()?;

        let frames = fragment(&payload, chunk_size);
        let (last, rest) = frames.split_last().expect("at least one frame");
        for frame in rest {
            transport.deliver(frame.clone());
            assert_eq!(input.available()?, 0, "chunk size {chunk_size}");
        }
        transport.deliver(last.clone());
        assert_eq!(input.available()?, payload.len(), "chunk size {chunk_size}");

        let mut buf = vec![0; payload.len()];
        let n = (&*input).read(&mut buf)?;
        assert_eq!(n, payload.len(), "read as one message");
        assert_eq!(buf, payload);
    }
    Ok(())
}

#[test]
fn test_disconnect_releases_reader_and_renews_streams() -> Result<()> {
    let (transport, adapter) = connected()?;
    let old_input = adapter.input_stream()?;
    let old_output = adapter.output_stream()?;

    let (tx, rx) = crossbeam_channel::bounded(1);
    let reader = Arc::clone(&old_input);
    let handle = thread::spawn(move || {
        let mut buf = [0; 8];
        let _ = tx.send((&*reader).read(&mut buf));
    });

    thread::sleep(Duration::from_millis(50));
    transport.drop_connection();

    let err = rx
        .recv_timeout(TIMEOUT)
        .wrap_err("blocked reader was not released")?
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    handle.join().map_err(|_| eyre::eyre!("reader thread panicked"))?;

    assert!(matches!(
        adapter.input_stream(),
        Err(AdapterError::NotConnected)
    ));

    adapter.connect(addr())?;
    let new_input = adapter.input_stream()?;
    let new_output = adapter.output_stream()?;
    assert!(!Arc::ptr_eq(&old_input, &new_input));
    assert!(!Arc::ptr_eq(&old_output, &new_output));

    // only the new stream receives frames
    assert_eq!(transport.listeners().frame().len(), 1);
    transport.deliver(Frame::builder().payload(vec![5]).build()?);
    assert_eq!(new_input.read_byte()?, 5);
    Ok(())
}

#[test]
fn test_close_through_stream_closes_everything() -> Result<()> {
    let (transport, adapter) = connected()?;
    let input = adapter.input_stream()?;
    let output = adapter.output_stream()?;

    output.write_bytes(b"never sent")?;
    input.close()?;
    input.close()?;

    assert_eq!(transport.close_calls(), 1);
    assert!(adapter.is_closed());
    assert!(output.is_closed());
    assert!(transport.sent_frames().is_empty());
    assert!(transport.listeners().frame().is_empty());

    let err = (&*output).flush().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Other);
    assert!(matches!(
        adapter.output_stream(),
        Err(AdapterError::AlreadyClosed(_))
    ));
    assert!(matches!(
        adapter.connect(addr()),
        Err(AdapterError::TransportFailure(_))
    ));
    Ok(())
}

#[test]
fn test_concurrent_producer_and_reader() -> Result<()> {
    let (transport, adapter) = connected()?;
    let input = adapter.input_stream()?;

    let producer = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || {
            for i in 0..100u8 {
                for frame in fragment(&[i; 10], 4) {
                    transport.deliver(frame);
                }
            }
        })
    };

    let mut received = vec![0; 1000];
    (&*input).read_exact(&mut received)?;
    producer
        .join()
        .map_err(|_| eyre::eyre!("producer thread panicked"))?;

    for (i, chunk) in received.chunks(10).enumerate() {
        assert!(chunk.iter().all(|&b| usize::from(b) == i), "message {i} out of order");
    }
    Ok(())
}

/// Memory transport whose close takes a while to complete.
struct SlowClose {
    inner: MemoryTransport,
    delay: Duration,
}

impl Transport for SlowClose {
    fn connect(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
        self.inner.connect(addr, timeout)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn send_frame(&self, frame: Frame) -> io::Result<()> {
        self.inner.send_frame(frame)
    }

    fn close(&self) -> io::Result<()> {
        thread::sleep(self.delay);
        self.inner.close()
    }

    fn listeners(&self) -> &ListenerRegistry {
        self.inner.listeners()
    }
}

#[test]
fn test_concurrent_stream_closes_close_transport_once() -> Result<()> {
    let transport = Arc::new(SlowClose {
        inner: MemoryTransport::new(),
        delay: Duration::from_millis(100),
    });
    let adapter = Adapter::new(transport.clone());
    adapter.connect(addr())?;
    let input = adapter.input_stream()?;
    let output = adapter.output_stream()?;

    let barrier = Arc::new(Barrier::new(2));
    let closer = {
        let barrier = Arc::clone(&barrier);
        let input = Arc::clone(&input);
        thread::spawn(move || {
            barrier.wait();
            input.close()
        })
    };
    barrier.wait();
    output.close()?;
    closer
        .join()
        .map_err(|_| eyre::eyre!("closing thread panicked"))??;

    assert_eq!(transport.inner.close_calls(), 1);
    assert!(adapter.is_closed());
    assert!(input.is_closed());
    assert!(output.is_closed());
    Ok(())
}

#[test]
fn test_connection_lost_while_sending() -> Result<()> {
    let (transport, adapter) = connected()?;
    let input = adapter.input_stream()?;
    let output = adapter.output_stream()?;

    transport.disconnect_on_send(true);
    output.write_bytes(b"lost")?;
    let (tx, rx) = crossbeam_channel::bounded(1);
    let flushing = Arc::clone(&output);
    thread::spawn(move || {
        let _ = tx.send((&*flushing).flush());
    });
    let err = rx
        .recv_timeout(TIMEOUT)
        .wrap_err("flush did not return")?
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

    assert!(!adapter.is_connected());
    assert!(input.is_closed());
    assert!(output.is_closed());
    assert!(transport.listeners().frame().is_empty());

    transport.disconnect_on_send(false);
    adapter.connect(addr())?;
    let output = adapter.output_stream()?;
    output.write_bytes(b"found")?;
    output.flush_frame()?;
    let sent = transport.sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0].payload()[..], b"found");
    Ok(())
}
