//! Whereizit client and server internals.
//!
//! The `whereizit` binary (CLI client) and `whereizit-server` binary are
//! thin wrappers over these modules; shared domain logic lives in the
//! `whereizit-core` crate.

pub mod client;
pub mod commands;
pub mod config;
pub mod server;
