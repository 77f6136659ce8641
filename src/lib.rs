//! Recipebox application crate: configuration and the reference sync server.

pub mod config;
pub mod server;
