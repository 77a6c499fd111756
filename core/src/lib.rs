//! Shared utilities for the Vermilion render-state tools.
//!
//! This crate hosts the pieces that both the live loader and the offline
//! packager build on:
//!
//! - [`ThreadPool`] - a fixed-size worker pool with an explicit
//!   wait-for-all barrier, used by the packager's two-phase build.
//! - [`SourceStreamFactory`] - search-directory file resolution with an
//!   in-memory overlay, used for shader sources and render-state files.

pub mod streams;
pub mod thread_pool;

pub use streams::{SourceStreamFactory, StreamError};
pub use thread_pool::ThreadPool;
