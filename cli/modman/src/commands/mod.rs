//! CLI command implementations.

pub mod index;
pub mod init;
pub mod repo;
