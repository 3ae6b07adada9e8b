//! Domain models for the API.

pub mod user;

pub use user::{NewUser, User, UserView};
