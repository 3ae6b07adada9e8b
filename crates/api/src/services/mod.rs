//! Business logic services.
//!
//! - `auth` - Credential verification, token issuance, identity resolution
//!   and shadow-user reconciliation

pub mod auth;
