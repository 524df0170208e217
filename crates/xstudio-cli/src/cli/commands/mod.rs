//! CLI command handlers.

pub mod config;
pub mod files;
pub mod inspect;
pub mod transform;
pub mod watch;
