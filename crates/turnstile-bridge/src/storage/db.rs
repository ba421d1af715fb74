//! `SQLite` database for the `Turnstile` bridge.
//!
//! Stands in for the hosted membership store: members, tenant settings, the
//! device command queue and the sync log all live in one database.

pub use turnstile_core::db::DatabaseError;

turnstile_core::define_database!(BridgeDatabase, "Bridge database migrations complete");
