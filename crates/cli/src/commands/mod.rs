//! Subcommand implementations

pub mod namespaces;
pub mod nodes;
pub mod resources;
pub mod status;
