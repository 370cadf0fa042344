//! Storage infrastructure: configuration and session history.
//!
//! The `config` sub-module reads and writes the TOML configuration
//! file in the platform-appropriate directory, providing sensible
//! defaults on first run. The `sessions` sub-module implements the
//! application layer's `SessionStore` contract on SQLite.

pub mod config;
pub mod sessions;
