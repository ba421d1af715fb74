//! `Turnstile` Core Library
//!
//! Shared functionality for `Turnstile` components:
//! - Membership expiry and grace-period resolution
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers shared by storage layers
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod expiry;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use expiry::{ExpiryResolution, resolve};
