use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `actiongate` - risk-tiered confirmation gate for AI-agent integration
/// actions.
#[derive(Parser, Debug)]
#[command(name = "actiongate")]
#[command(version = "0.1.0")]
#[command(about = "Gate agent integration actions behind risk, rate, and human checks.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show configuration, live rate windows, and pending confirmations
    Status,

    /// Run one action through the gate, confirming interactively
    Simulate {
        /// Service the action targets (e.g. slack, email)
        #[arg(long)]
        service: String,

        /// Action verb (e.g. send_message, delete_record)
        #[arg(long)]
        action: String,

        /// Requesting agent identity
        #[arg(long, default_value = "cli:local")]
        agent: String,

        /// Human-readable service label (defaults to the service key)
        #[arg(long)]
        service_name: Option<String>,

        /// What the action operates on, shown on the confirmation card
        #[arg(long)]
        target: Option<String>,

        /// Preview of the action's effect, shown on the confirmation card
        #[arg(long)]
        preview: Option<String>,

        /// Risk tier override (auto, soft, hard) instead of classifying the verb
        #[arg(long)]
        risk: Option<String>,

        /// Repeat the action, useful for watching the rate window drain
        #[arg(long, default_value = "1")]
        count: u32,
    },

    /// Review a dry-run plan from a JSON file
    Plan {
        /// JSON file holding the plan (id, agent, steps)
        file: PathBuf,
    },

    /// Inspect or manage the audit log
    Audit {
        #[command(subcommand)]
        audit_command: AuditCommands,
    },

    /// Inspect or adjust per-service rate windows
    Limits {
        #[command(subcommand)]
        limits_command: LimitsCommands,
    },

    /// Inspect or assign per-agent access levels
    Access {
        #[command(subcommand)]
        access_command: AccessCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuditCommands {
    /// List recent entries, most recent first
    List {
        /// Maximum entries to show (default from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Only entries for this service
        #[arg(long)]
        service: Option<String>,

        /// Emit entries as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Today's totals and per-service breakdown
    Stats,

    /// Delete every entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LimitsCommands {
    /// Show configured limits and live windows
    Show,

    /// Clear the live window for a service, restoring its quota
    Reset { service: String },

    /// Hand back quota units without resetting the window start
    Bump {
        service: String,

        #[arg(default_value = "10")]
        extra: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccessCommands {
    /// Show explicit access assignments and the default level
    Show,

    /// Assign an access level (none, read, write, full) to an agent on a service
    Set {
        agent: String,
        service: String,
        level: String,
    },
}
