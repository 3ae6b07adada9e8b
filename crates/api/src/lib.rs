//! DripHub API library.
//!
//! Reconciles two identity sources, local password accounts and a hosted
//! identity provider, into a single [`Principal`](driphub_core::Principal) for
//! request handlers. The HTTP surface is exposed as a library so it can be
//! served in-process by tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use routes::router;
pub use state::AppState;
