//! CLI subcommand implementations.

pub mod migrate;
pub mod provider;
pub mod user;
