//! Partition types and traits
//!
//! Defines the router abstraction and the parent-stream capability it
//! reads partitions from.

use crate::error::Result;
use crate::request::RequestOptionsProvider;
use crate::slice::{Record, SliceIter};
use crate::state::StreamState;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Parent stream name -> that parent's state
pub type ParentStates = BTreeMap<String, StreamState>;

/// Enumerates the partitions a stream must be read across
///
/// Slices produced by a router carry only a `partition`; their
/// `cursor_slice` is empty.
#[async_trait]
pub trait PartitionRouter: RequestOptionsProvider + Send + Sync {
    /// Partitions to read, in a deterministic order for this run
    async fn stream_slices(&mut self) -> Result<SliceIter>;

    /// Seed parent streams from persisted parent state
    ///
    /// Routers without parents ignore it.
    fn set_initial_state(&mut self, _parent_state: &ParentStates) -> Result<()> {
        Ok(())
    }

    /// Parent state to persist; empty for stateless routers
    ///
    /// Reflects the last committed enumeration, never one whose partitions
    /// are still being read.
    fn get_stream_state(&self) -> ParentStates {
        ParentStates::new()
    }

    /// Publish the parent state captured by the latest `stream_slices`
    ///
    /// Called once every partition of that enumeration has been closed.
    fn commit_parent_state(&mut self) {}
}

/// A stream whose progress can be read and restored
pub trait StatefulStream {
    /// Current progress
    fn get_stream_state(&self) -> StreamState;

    /// Restore progress
    fn set_stream_state(&mut self, state: &StreamState) -> Result<()>;
}

/// A stream whose records define the partitions of a child stream
#[async_trait]
pub trait ParentStream: Send + Sync {
    /// Stream name, used as the key in `parent_state`
    fn name(&self) -> &str;

    /// Read every record the parent currently yields
    async fn read_records(&mut self) -> Result<Vec<Record>>;

    /// State capability, if this stream tracks progress
    fn as_stateful(&self) -> Option<&dyn StatefulStream> {
        None
    }

    /// Mutable state capability, if this stream tracks progress
    fn as_stateful_mut(&mut self) -> Option<&mut dyn StatefulStream> {
        None
    }
}
