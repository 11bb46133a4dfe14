#![forbid(unsafe_code)]

//! Instagram video resolver and relay.
//!
//! The crate resolves post links to direct media URLs, memoizes them, keeps a
//! few usage counters and streams the media back through the backend binary.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod relay;
pub mod resolver;
pub mod sqlite;
pub mod stats;
