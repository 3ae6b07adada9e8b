//! Core types for DripHub.

pub mod email;
pub mod id;
pub mod principal;

pub use email::{Email, EmailError};
pub use id::UserId;
pub use principal::{AuthMethod, Principal};
