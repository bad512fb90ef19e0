//! CLI commands

pub mod upgrade;
