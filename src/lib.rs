//! zedconsole - command interpreter and schema tooling for SpiceDB
//!
//! This library provides the core of the console: the `zed` command
//! interpreter, the SpiceDB HTTP client, schema parsing and highlighting,
//! and the axum router that exposes them.

pub mod errors;
pub mod schema;
pub mod settings;
pub mod spicedb;
pub mod terminal;
pub mod web;
