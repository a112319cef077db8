//! Listener capabilities and the registry a transport notifies through.
//!
//! A [`ListenerSet`] is an ordered set of shared listeners with identity
//! semantics: registering the same `Arc` twice has no additional effect.
//! Notification takes a snapshot of the set under its lock and invokes the
//! listeners on the calling thread after releasing it, so a listener may
//! register or unregister listeners from inside a callback. Whether such a
//! change affects the notification pass already in progress is unspecified.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::frame::Frame;
use crate::sync::with_lock;

/// Receives connection state changes of a transport.
pub trait ConnectionListener: Send + Sync {
    fn on_connected(&self);

    fn on_disconnected(&self);
}

/// Receives frames as the transport reads them.
///
/// Invoked on the transport's own I/O thread.
pub trait FrameListener: Send + Sync {
    fn on_frame_received(&self, frame: &Frame);
}

impl<F> FrameListener for F
where
    F: Fn(&Frame) + Send + Sync,
{
    fn on_frame_received(&self, frame: &Frame) {
        self(frame)
    }
}

/// Mutex-guarded ordered set of listeners, compared by identity.
pub struct ListenerSet<L: ?Sized> {
    name: &'static str,
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::with_capacity(1)),
        }
    }

    /// Add `listener` unless it is already registered.
    ///
    /// Returns `true` if the set changed.
    pub fn register(&self, listener: Arc<L>) -> bool {
        with_lock(self.name, &self.listeners, |mut listeners| {
            if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                return false;
            }
            listeners.push(listener);
            true
        })
    }

    /// Remove `listener` if registered.
    ///
    /// Returns `true` if the set changed.
    pub fn unregister(&self, listener: &Arc<L>) -> bool {
        with_lock(self.name, &self.listeners, |mut listeners| {
            let before = listeners.len();
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            listeners.len() != before
        })
    }

    pub fn contains(&self, listener: &Arc<L>) -> bool {
        with_lock(self.name, &self.listeners, |listeners| {
            listeners.iter().any(|l| Arc::ptr_eq(l, listener))
        })
    }

    pub fn len(&self) -> usize {
        with_lock(self.name, &self.listeners, |listeners| listeners.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each(&self, f: impl Fn(&L)) {
        let snapshot = with_lock(self.name, &self.listeners, |listeners| listeners.clone());
        for listener in &snapshot {
            f(listener.as_ref());
        }
    }
}

impl<L: ?Sized> fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

/// Connection and frame listeners of one transport.
///
/// Transports embed a registry and call the `notify_*` methods from their
/// I/O thread; see [`Transport::listeners`](crate::Transport::listeners).
#[derive(Debug)]
pub struct ListenerRegistry {
    connection: ListenerSet<dyn ConnectionListener>,
    frame: ListenerSet<dyn FrameListener>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self {
            connection: ListenerSet::new("ListenerRegistry.connection"),
            frame: ListenerSet::new("ListenerRegistry.frame"),
        }
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> &ListenerSet<dyn ConnectionListener> {
        &self.connection
    }

    pub fn frame(&self) -> &ListenerSet<dyn FrameListener> {
        &self.frame
    }

    pub fn notify_connected(&self) {
        tracing::debug!("notifying connected");
        self.connection.for_each(|l| l.on_connected());
    }

    pub fn notify_disconnected(&self) {
        tracing::debug!("notifying disconnected");
        self.connection.for_each(|l| l.on_disconnected());
    }

    pub fn notify_frame_received(&self, frame: &Frame) {
        tracing::trace!(
            len = frame.payload().len(),
            is_final = frame.is_final(),
            "notifying frame received"
        );
        self.frame.for_each(|l| l.on_frame_received(frame));
    }
}
