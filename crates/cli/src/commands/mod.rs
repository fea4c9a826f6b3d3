//! CLI subcommands

pub mod containers;
pub mod report;
pub mod status;
pub mod values;
