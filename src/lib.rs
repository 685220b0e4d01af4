//! # Incremental CDK
//!
//! The slicing, cursor and pagination engine of a declarative connector
//! framework: it decides which slice of data to request next, pages through
//! an API until exhaustion, tracks progress per stream or per partition and
//! emits resumable checkpoints.
//!
//! ## Features
//!
//! - **Cursors**: Datetime windows, monotonic values, one cursor shared by all
//!   partitions or one cursor per partition
//! - **Partition Routing**: Static lists, parent streams, Cartesian products
//! - **Smart Pagination**: Cursor, offset, page number, link header support
//! - **Checkpoints**: State after every N records, every slice and every stream,
//!   never ahead of the last fully read slice
//! - **Declarative Streams**: YAML definitions built into runtime components
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use incremental_cdk::config::ConnectorDefinition;
//! use incremental_cdk::engine::{Message, SyncEngine};
//! use incremental_cdk::state::StateManager;
//! use incremental_cdk::{Result, SyncMode};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     incremental_cdk::logging::init();
//!
//!     let connector = ConnectorDefinition::from_file("connectors/shop.yaml")?;
//!     let transport = Arc::new(connector.build_client()?);
//!     let config = serde_json::json!({ "start_date": "2024-01-01T00:00:00Z" });
//!     let mut stream = connector.build_stream("orders", transport, &config)?;
//!
//!     let mut engine = SyncEngine::new(StateManager::from_file("state.json")?);
//!     let mut messages: Vec<Message> = Vec::new();
//!     engine
//!         .read_stream(&mut stream, SyncMode::Incremental, &mut messages, &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         SyncEngine                              │
//! │  for slice: page → extract → observe → emit → close → STATE     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Cursor  │ Partition │   Paginate    │   HTTP    │   State     │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Datetime │ List      │ Cursor        │ Transport │ StreamState │
//! │ Value    │ Substream │ Offset        │ Retry     │ Manager     │
//! │ Global   │ Cartesian │ Page Number   │ Backoff   │ JSON file   │
//! │ Per-part.│           │ Link Header   │           │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the CDK
pub mod error;

/// Common types and type aliases
pub mod types;

/// Stream slices and records
pub mod slice;

/// Request options and their injection locations
pub mod request;

/// Cursors and progress tracking
pub mod cursor;

/// Partition routing
pub mod partition;

/// Pagination strategies
pub mod pagination;

/// HTTP transport with retry
pub mod http;

/// Record extraction (JSON, JSONL)
pub mod decode;

/// State management and checkpointing
pub mod state;

/// Main execution engine
pub mod engine;

/// Declarative stream definitions
pub mod config;

/// Template interpolation
pub mod template;

/// Tracing subscriber setup
pub mod logging;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{ConnectorDefinition, StreamDefinition};
pub use cursor::{Cursor, Observation};
pub use engine::{DeclarativeStream, Message, MessageSink, SyncConfig, SyncEngine};
pub use slice::{Record, StreamSlice};
pub use state::{StateManager, StreamState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
