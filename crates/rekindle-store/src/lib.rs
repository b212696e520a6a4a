//! # Rekindle Store
//!
//! Durable keyed storage of per-participant lifecycle state. Every
//! lifecycle mutation is a single conditional UPDATE, so concurrent
//! readers never observe a half-updated record and no two writers can
//! advance the same record's stage twice for one send.

mod users;

pub use users::UserStore;
