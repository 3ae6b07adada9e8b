//! DripHub Core - Shared identity types.
//!
//! This crate provides the types shared between the API server, the CLI and the
//! integration tests:
//! - [`Email`] - validated email address, the join key between identity sources
//! - [`UserId`] - local user primary key
//! - [`Principal`] - the normalized authenticated identity handed to handlers
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. Database encoding is available behind the `postgres` feature.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
