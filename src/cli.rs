use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Compliance task engine for bookkeeping firms.
/// Each tenant's data lives in its own JSON file under the data directory.
#[derive(Parser)]
#[command(name = "ft", version, about = "Compliance tasks, recurrence and status workflow for accounting firms")]
pub struct Cli {
    /// Path to a tenant database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Tenant name to open.
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// User id treated as "me" by task lists.
    #[arg(long, global = true)]
    pub me: Option<u64>,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
