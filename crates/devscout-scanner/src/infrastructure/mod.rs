//! Infrastructure layer for the scanner.
//!
//! Contains the outward-facing adapters: the two discovery sources and
//! the backend boundaries they wrap, the TOML configuration
//! repository, and the SQLite session store.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `devscout_core`, but MUST NOT be imported by the domain layer.

pub mod discovery;
pub mod storage;
