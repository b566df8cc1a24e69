//! # uai-sessions
//!
//! Durable per-session conversation records.
//!
//! - [`SessionStore`] - one JSON file per session in a directory
//! - [`SessionRegistry`] - in-memory owner of open sessions, writes through to the store
//! - [`session_stats`] - message count and elapsed time for a record

pub mod error;
pub mod registry;
pub mod stats;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use stats::{format_duration, session_stats};
pub use store::{SessionStore, SESSION_DIR_ENV};
pub use types::{Message, Role, Session, SessionStats};
