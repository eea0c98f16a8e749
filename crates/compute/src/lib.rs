//! Authenticated access to the compute provider's instance/snapshot API.
//!
//! This crate provides:
//! - `Credentials` and an expiring `AccessToken` obtained via password grant
//! - `AuthenticatedClient`, the capability the rotation loop is written against
//! - `ComputeSession`, the reqwest-backed implementation with lazy re-authentication

pub mod auth;
pub mod client;
pub mod error;
pub mod session;

pub use auth::{AccessToken, Credentials, Endpoints};
pub use client::AuthenticatedClient;
pub use error::ComputeError;
pub use session::ComputeSession;
