//! Partition routing module
//!
//! Supports: Single (unpartitioned), static List, Parent streams and
//! Cartesian products of other routers
//!
//! # Overview
//!
//! A router enumerates the partitions a stream must be read across. This is
//! useful for:
//! - Child resources that require a parent ID
//! - Static lists of values (e.g., regions, accounts)
//! - Combinations of the above
//!
//! Parent-based routers can read their parents incrementally; the parents'
//! progress is then persisted as `parent_state` next to the child's state.

mod routers;
mod types;

pub use routers::{
    extract_parent_key, CartesianProductRouter, ListPartitionRouter, ParentStreamConfig,
    SinglePartitionRouter, SubstreamPartitionRouter,
};
pub use types::{ParentStates, ParentStream, PartitionRouter, StatefulStream};
