//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `DeclarativeStream` - One endpoint with its extractor, paginator and
//!   slicer (a partition router or a cursor)
//! - `SyncEngine` - Reads a stream slice by slice, page by page, feeding the
//!   cursor and emitting records and checkpoints
//! - `SyncConfig` - Checkpoint cadence and status messages
//! - Message types and sinks for output (Record, State, Status)
//!
//! # Checkpoints
//!
//! In incremental mode a STATE message is emitted every
//! `checkpoint_interval` records within a slice, after every closed slice,
//! and once when the stream ends, even if it produced nothing. The cursor
//! only advances when a slice is closed, so no checkpoint covers a slice that
//! was not read to the end. Full refresh reads emit no STATE.

mod stream;
mod types;

pub use stream::{DeclarativeStream, PageOutcome, SlicePager, StreamSlicer};
pub use types::{Message, MessageSink, StreamStatus, SyncConfig, SyncStats};

use crate::cursor::Observation;
use crate::error::{Error, Result};
use crate::slice::Record;
use crate::state::{StateManager, StreamState};
use crate::types::SyncMode;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// State manager
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics across every stream read
    stats: SyncStats,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(state: StateManager) -> Self {
        Self {
            state,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = SyncStats::default();
    }

    /// Read one stream to completion, cancellation, or the first error
    ///
    /// In incremental mode the stream is seeded from the state manager and
    /// every checkpoint is written back to it. Errors propagate unchanged
    /// after an INCOMPLETE status; the last emitted checkpoint stays valid.
    pub async fn read_stream(
        &mut self,
        stream: &mut DeclarativeStream,
        mode: SyncMode,
        sink: &mut dyn MessageSink,
        cancel: &CancellationToken,
    ) -> Result<SyncStats> {
        self.config.validate()?;
        let start = Instant::now();
        let incremental = mode == SyncMode::Incremental;

        if incremental {
            if !stream.supports_incremental() {
                return Err(Error::config(format!(
                    "stream '{}' has no cursor and cannot be read incrementally",
                    stream.name()
                )));
            }
            if let Some(state) = self.state.get_stream_state(stream.name()).await {
                debug!("Stream '{}': resuming from {:?}", stream.name(), state);
                stream.set_initial_state(&state)?;
            }
        }

        info!("Reading stream '{}' ({:?})", stream.name(), mode);
        let mut run = StreamRun {
            stream: stream.name().to_string(),
            sink,
            state: &self.state,
            config: &self.config,
            stats: SyncStats::default(),
            running: false,
            since_checkpoint: 0,
        };
        run.status(StreamStatus::Started)?;

        match run.read(stream, incremental, cancel).await {
            Ok(()) => {
                let status = if run.stats.cancelled {
                    StreamStatus::Incomplete
                } else {
                    StreamStatus::Complete
                };
                run.status(status)?;
            }
            Err(e) => {
                warn!("Stream '{}' failed: {}", run.stream, e);
                if let Err(status_err) = run.status(StreamStatus::Incomplete) {
                    warn!("Could not report INCOMPLETE status: {}", status_err);
                }
                return Err(e);
            }
        }

        let mut stats = run.stats;
        stats.streams_synced = 1;
        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Completed stream '{}': {} records, {} pages, {} slices{}",
            stream.name(),
            stats.records_emitted,
            stats.pages_fetched,
            stats.slices_read,
            if stats.cancelled { " (cancelled)" } else { "" }
        );

        self.stats.merge(&stats);
        Ok(stats)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Per-read bookkeeping: the sink, counters and the RUNNING latch
struct StreamRun<'a> {
    stream: String,
    sink: &'a mut dyn MessageSink,
    state: &'a StateManager,
    config: &'a SyncConfig,
    stats: SyncStats,
    running: bool,
    since_checkpoint: usize,
}

impl StreamRun<'_> {
    async fn read(
        &mut self,
        stream: &mut DeclarativeStream,
        incremental: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let slices = stream.stream_slices().await?;

        for slice in slices {
            if cancel.is_cancelled() {
                self.stats.cancelled = true;
                break;
            }

            debug!("Stream '{}': reading {}", self.stream, slice);
            self.since_checkpoint = 0;
            let mut pager = stream.start_slice(slice);

            let finished = loop {
                let records = match stream.next_page(&mut pager, cancel).await? {
                    PageOutcome::Page(records) => records,
                    PageOutcome::Done => break true,
                    PageOutcome::Cancelled => break false,
                };
                self.stats.pages_fetched += 1;

                for record in records {
                    if incremental {
                        if !self.accept(stream, &record) {
                            continue;
                        }
                        self.emit_record(record)?;
                        if self
                            .config
                            .checkpoint_interval
                            .is_some_and(|interval| self.since_checkpoint >= interval)
                        {
                            self.checkpoint(stream.get_stream_state()).await?;
                        }
                    } else {
                        self.emit_record(record)?;
                    }
                }
            };

            if !finished {
                debug!("Stream '{}': cancelled inside {}", self.stream, pager.slice());
                self.stats.cancelled = true;
                break;
            }

            self.stats.slices_read += 1;
            if incremental {
                stream.close_slice(pager.slice())?;
                self.checkpoint(stream.get_stream_state()).await?;
            }
        }

        if incremental {
            self.checkpoint(stream.get_stream_state()).await?;
        }
        Ok(())
    }

    /// Filter and observe one record; false drops it
    fn accept(&mut self, stream: &mut DeclarativeStream, record: &Record) -> bool {
        if stream.is_client_side_incremental() && !stream.should_be_synced(record) {
            self.stats.records_filtered += 1;
            return false;
        }

        let Some(slice) = record.associated_slice.as_ref() else {
            return true;
        };
        if let Some(Observation::Skipped(reason)) = stream.observe(slice, record) {
            warn!("Stream '{}': record not used for state: {}", self.stream, reason);
            self.stats.cursor_skips += 1;
        }
        true
    }

    fn emit_record(&mut self, record: Record) -> Result<()> {
        if !self.running {
            self.running = true;
            self.status(StreamStatus::Running)?;
        }
        self.sink.emit(Message::record(&self.stream, record.data))?;
        self.stats.records_emitted += 1;
        self.since_checkpoint += 1;
        Ok(())
    }

    async fn checkpoint(&mut self, state: StreamState) -> Result<()> {
        self.state.set_stream_state(&self.stream, state.clone()).await?;
        self.sink.emit(Message::state(&self.stream, state))?;
        self.stats.state_messages += 1;
        self.since_checkpoint = 0;
        Ok(())
    }

    fn status(&mut self, status: StreamStatus) -> Result<()> {
        if self.config.emit_status_messages {
            self.sink.emit(Message::status(&self.stream, status))?;
        }
        Ok(())
    }
}
