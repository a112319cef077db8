//! Adapter configuration.

use serde::{Deserialize, Serialize};

/// Sizing of the buffers each stream pair starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    /// Initial capacity of the queue of completed incoming messages.
    pub input_queue_capacity: usize,

    /// Initial capacity of the outgoing buffer, restored after each flush.
    pub output_buffer_capacity: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            input_queue_capacity: 5,
            output_buffer_capacity: 1024,
        }
    }
}

impl AdapterConfig {
    /// Load a JSON configuration. Missing keys take their defaults.
    pub fn from_reader(r: impl std::io::Read) -> eyre::Result<Self> {
        use eyre::WrapErr;

        let config: Self =
            serde_json::from_reader(r).wrap_err("parsing adapter configuration")?;
        tracing::debug!(?config, "loaded adapter configuration");
        Ok(config)
    }
}
