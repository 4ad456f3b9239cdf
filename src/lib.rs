//! handlefs: Capability-Handle Directory Mirroring
//!
//! Grants access to a directory through opaque handles, mirrors it as a flat
//! path-to-entry index, edits it with copy-then-delete primitives, and serves
//! its files over HTTP with console instrumentation injected into the root
//! document.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod mutation;
pub mod serve;
pub mod store;
pub mod tree;
pub mod workspace;
