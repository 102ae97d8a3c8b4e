//! Core data model for the Aether dependency resolver: coordinates,
//! versions, version ranges, dependencies/scopes, and the session that
//! threads configuration through every other component.
//!
//! This crate is free of async code and network I/O.

pub mod config;
pub mod coordinate;
pub mod dependency;
pub mod range;
pub mod selector;
pub mod session;
pub mod version;
