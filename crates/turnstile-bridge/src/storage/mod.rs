//! `SQLite` storage for the `Turnstile` bridge.
//!
//! Provides persistence for members, tenant settings, the device command
//! queue, and the sync log.

mod db;
mod models;
mod queries;
mod queries_queue;


pub use db::{BridgeDatabase, DatabaseError};
pub use models::*;
pub use queries::MemberParams;
pub use queries_queue::SyncLogParams;
