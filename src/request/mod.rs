//! Request shaping module
//!
//! Cursors, partition routers and paginators never issue requests; they
//! contribute key/value pairs to the outgoing request descriptor. This
//! module defines where a value is injected and how contributions from
//! several components are merged.

mod options;

pub use options::{combine_options, RequestOption, RequestOptionType, RequestOptions, RequestOptionsProvider};

#[cfg(test)]
mod tests;
