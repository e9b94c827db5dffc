//! Remote login exchange.
//!
//! `POST {backend}/auth/login` with a JSON `{email, password}` body. The
//! login surface only depends on the `AuthBackend` trait; `ApiClient` is the
//! reqwest implementation used by the binary.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthBackend, LoginResponse};
pub use error::ApiError;
