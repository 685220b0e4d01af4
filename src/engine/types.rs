//! Engine types
//!
//! Message types, sinks and configuration for the sync engine.

use crate::error::{Error, Result};
use crate::state::StreamState;
use crate::types::JsonObject;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle status of one stream's read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// The read began
    Started,
    /// The first record was emitted
    Running,
    /// Every slice was read and closed
    Complete,
    /// The read was cancelled or failed
    Incomplete,
}

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// One extracted record
    Record {
        /// Stream name
        stream: String,
        /// Record data
        data: JsonObject,
    },
    /// Checkpoint carrying the stream's full state
    State {
        /// Stream name
        stream: String,
        /// State at the time of the checkpoint
        state: StreamState,
    },
    /// Stream status transition
    Status {
        /// Stream name
        stream: String,
        /// New status
        status: StreamStatus,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, data: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            data,
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, state: StreamState) -> Self {
        Self::State {
            stream: stream.into(),
            state,
        }
    }

    /// Create a status message
    pub fn status(stream: impl Into<String>, status: StreamStatus) -> Self {
        Self::Status {
            stream: stream.into(),
            status,
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a status message
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// Append-only destination for engine output
pub trait MessageSink: Send {
    /// Emit one message
    fn emit(&mut self, message: Message) -> Result<()>;
}

impl MessageSink for Vec<Message> {
    fn emit(&mut self, message: Message) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

impl MessageSink for UnboundedSender<Message> {
    fn emit(&mut self, message: Message) -> Result<()> {
        self.send(message)
            .map_err(|_| Error::Other("message receiver was dropped".to_string()))
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Emit a checkpoint after this many records within a slice
    pub checkpoint_interval: Option<usize>,
    /// Emit STARTED/RUNNING/COMPLETE/INCOMPLETE status messages
    pub emit_status_messages: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: None,
            emit_status_messages: true,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set checkpoint interval
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = Some(interval);
        self
    }

    /// Enable or disable status messages
    #[must_use]
    pub fn with_status_messages(mut self, emit: bool) -> Self {
        self.emit_status_messages = emit;
        self
    }

    /// Reject a zero checkpoint interval
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_interval == Some(0) {
            return Err(Error::invalid_value(
                "checkpoint_interval",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records emitted
    pub records_emitted: usize,
    /// Records dropped by the cursor's should-be-synced filter
    pub records_filtered: usize,
    /// Records whose cursor value could not be used
    pub cursor_skips: usize,
    /// Pages fetched
    pub pages_fetched: usize,
    /// Slices read to completion
    pub slices_read: usize,
    /// Checkpoints emitted
    pub state_messages: usize,
    /// Streams read
    pub streams_synced: usize,
    /// Whether the read stopped on cancellation
    pub cancelled: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another run's counters into these
    pub fn merge(&mut self, other: &SyncStats) {
        self.records_emitted += other.records_emitted;
        self.records_filtered += other.records_filtered;
        self.cursor_skips += other.cursor_skips;
        self.pages_fetched += other.pages_fetched;
        self.slices_read += other.slices_read;
        self.state_messages += other.state_messages;
        self.streams_synced += other.streams_synced;
        self.cancelled |= other.cancelled;
        self.duration_ms += other.duration_ms;
    }
}
