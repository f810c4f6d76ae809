//! Shared primitives: configuration, errors, connections, schema.

pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod schemas;
pub mod time;
