pub mod commands;

pub use commands::{AccessCommands, AuditCommands, Cli, Commands, LimitsCommands};
