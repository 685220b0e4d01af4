//! Pagination module
//!
//! Supports: Cursor (body path, header, last record), Offset, Page Number,
//! Link Header, and stop conditions layered over any of them.
//!
//! # Overview
//!
//! A [`PaginationStrategy`] reads the last response and produces the raw
//! continuation value. A [`Paginator`] wraps that value as
//! `{"next_page_token": value}` and injects it into exactly one location of
//! the next request: the path, a query parameter, a header, or a body field.
//! `None` from `next_page_token` ends pagination for the current slice.

mod paginator;
mod strategies;
mod types;

pub use paginator::{DefaultPaginator, NoPagination, PageTokenOption, PaginatorTestReadDecorator};
pub use strategies::{
    CursorPaginationStrategy, CursorSource, LinkHeaderStrategy, OffsetIncrement, PageIncrement,
    StopConditionStrategy,
};
pub use types::{
    check_stop_condition, wrap_token, PageCounters, PaginationStrategy, Paginator, StopCondition,
    StopResult, StopTracker, NEXT_PAGE_TOKEN,
};
