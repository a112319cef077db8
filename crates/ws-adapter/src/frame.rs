//! Frames exchanged with a [`Transport`](crate::Transport).

use bytes::Bytes;

use crate::error::{AdapterError, Result};

/// One discrete unit of payload delivered by or sent to a transport.
///
/// A frame is immutable. Consecutive frames up to and including the first
/// one marked final form a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
    is_final: bool,
}

impl Frame {
    /// Start building a frame. The final flag defaults to `true`.
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    /// A final frame with an empty payload.
    pub fn empty() -> Self {
        Self::new(Bytes::new(), true)
    }

    pub(crate) fn new(payload: Bytes, is_final: bool) -> Self {
        Self { payload, is_final }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this frame completes a message.
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

/// Builder for [`Frame`]
#[derive(Debug)]
pub struct FrameBuilder {
    payload: Option<Bytes>,
    is_final: bool,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self {
            payload: None,
            is_final: true,
        }
    }
}

impl FrameBuilder {
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn is_final(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }

    /// Build the frame.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidFrame`] if no payload was specified.
    /// An empty payload is valid.
    pub fn build(self) -> Result<Frame> {
        let payload = self
            .payload
            .ok_or(AdapterError::InvalidFrame("no payload specified"))?;
        Ok(Frame::new(payload, self.is_final))
    }
}
