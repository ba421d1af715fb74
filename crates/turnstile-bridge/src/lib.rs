//! Turnstile Bridge Library
//!
//! Keeps biometric access terminals in line with membership state:
//! - SQLite storage for members, tenant settings, the device command queue,
//!   and the sync log
//! - Relay client for the synchronous `set-user` path
//! - Command emitter with direct and queued delivery
//! - Reconciliation engine (expiry sweep, per-member sync, admin queue actions)
//! - HTTP function endpoints

pub mod api;
pub mod device;
pub mod emitter;
pub mod engine;
pub mod relay;
pub mod storage;
pub mod sync_log;
