use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialpipe_frame::{FrameKind, OnFull};
use serialpipe_transport::TransferMode;

use crate::error::{ChannelError, Result};

/// Default depth of both queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Default UART receive scratch size.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 256;

/// Receive scratch size for the USB virtual serial port.
pub const USB_SCRATCH_CAPACITY: usize = 1024;

/// How long the receive worker waits for queue room before evicting.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(10);

/// Configuration for one channel: a send and a receive pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Used for worker thread names and log fields.
    pub name: String,
    pub send: SendConfig,
    pub receive: ReceiveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    pub queue_capacity: usize,
    /// Policy when callers enqueue into a full queue.
    pub on_full: OnFull,
    pub transfer: TransferMode,
    /// Bound on one transmit (blocking) or on its completion (DMA).
    /// `None` waits forever.
    #[serde(rename = "transmit_timeout_ms", with = "duration_ms")]
    pub transmit_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveConfig {
    pub queue_capacity: usize,
    pub scratch_capacity: usize,
    /// Terminate received frames so consumers can treat them as strings.
    pub as_text: bool,
    /// Policy when the consumer falls behind.
    pub on_full: OnFull,
    /// Wait for queue room before `on_full` kicks in. `None` waits forever.
    #[serde(rename = "enqueue_timeout_ms", with = "duration_ms")]
    pub enqueue_timeout: Option<Duration>,
    pub transfer: TransferMode,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            on_full: OnFull::Block,
            transfer: TransferMode::Blocking,
            transmit_timeout: None,
        }
    }
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            as_text: true,
            on_full: OnFull::DropOldest,
            enqueue_timeout: Some(DEFAULT_ENQUEUE_TIMEOUT),
            transfer: TransferMode::Dma,
        }
    }
}

impl ReceiveConfig {
    pub fn frame_kind(&self) -> FrameKind {
        if self.as_text {
            FrameKind::Text
        } else {
            FrameKind::Binary
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::uart("uart1")
    }
}

impl ChannelConfig {
    /// UART channel: blocking transmit, DMA receive-to-idle into 256 bytes.
    pub fn uart(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            send: SendConfig::default(),
            receive: ReceiveConfig::default(),
        }
    }

    /// USB virtual serial channel: the USB stack completes receives on its
    /// own, into a larger buffer.
    pub fn usb_virtual_serial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            send: SendConfig::default(),
            receive: ReceiveConfig {
                scratch_capacity: USB_SCRATCH_CAPACITY,
                ..ReceiveConfig::default()
            },
        }
    }

    /// Parse and validate a JSON description. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChannelError::Config("name must not be empty".to_string()));
        }
        if self.send.queue_capacity == 0 {
            return Err(ChannelError::Config(
                "send.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.receive.queue_capacity == 0 {
            return Err(ChannelError::Config(
                "receive.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.receive.scratch_capacity == 0 {
            return Err(ChannelError::Config(
                "receive.scratch_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `Option<Duration>` as optional whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
