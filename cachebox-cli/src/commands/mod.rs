//! CLI command implementations.

pub mod crypt;
pub mod session;
