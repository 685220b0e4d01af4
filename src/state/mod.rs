//! State management module
//!
//! Handles stream state shapes, checkpoint persistence and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `StreamState` - One stream's checkpoint: the cursor's opaque `state`
//!   plus the recursive `parent_state` of substream parents
//! - `ConnectorState` - Every stream's checkpoint, keyed by stream name
//! - `StateManager` - File-based state persistence

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{ConnectorState, StreamState};
