//! CLI subcommand implementations.

pub mod checksum;
pub mod predict;
pub mod serve;
pub mod validate;
