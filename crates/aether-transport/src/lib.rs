//! Transport layer for the Aether dependency resolver: the `peek`/`get`/
//! `put` contract, concrete File/HTTP transports, the multi-algorithm
//! checksum calculator, partial-file resume, repository identity, layout,
//! and the connector that ties them together per (session, remote-repo).

pub mod auth;
pub mod checksum;
pub mod connector;
pub mod file_transport;
pub mod http_transport;
pub mod layout;
pub mod partial;
pub mod repository;
pub mod transport;
pub mod trusted_checksums;
