//! Session store — per-sender conversation state with per-key locking.

pub mod store;

pub use store::{SessionGuard, SessionStore, spawn_sweep_task};
