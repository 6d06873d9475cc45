//! # ft - compliance task engine for accounting firms
//!
//! A command-line task store for bookkeeping practices. Each tenant (firm) keeps
//! its own JSON database holding staff, clients, entities, service types, the
//! task status workflow and the tasks themselves.
//!
//! ## Key Features
//!
//! - **Compliance periods**: end dates derived from a filing frequency and start date
//! - **Recurrence**: completing a recurring task generates the next period's task
//! - **Status workflow**: per-tenant transition rules, checked per task on bulk moves
//! - **Task lists**: quick filters, search and field filters with bucket metrics
//!
//! ## Quick Start
//!
//! ```bash
//! ft tenant new "North Shore Accounting"
//! ft status add New --rank 1
//! ft status add Done --rank 9
//! ft user add "Ana Lopez"
//! ft client add "Harbour Bakery"
//! ft entity add 1 "Harbour Bakery Pty Ltd"
//! ft service add BAS
//! ft add "Lodge quarterly BAS" --assignee 1 --due eom --client 1 --entity 1 \
//!     --service 1 --frequency Quarterly --year 2024 --start 2024-07-01 --recurring
//! ft list --quick overdue
//! ft complete 1
//! ```
//!
//! Data lives in `~/.firmtask/` (or `$FIRMTASK_HOME`), one `<tenant>_firm.json` per tenant.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

pub mod cli;
pub mod cmd;
pub mod compliance;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod fields;
pub mod filter;
pub mod recurrence;
pub mod task;
pub mod tenant;
pub mod workflow;

use cli::Cli;
use cmd::*;
use config::Settings;
use db::Database;
use error::{FirmError, Result};
use tenant::*;

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let level = if cli.verbose { Level::DEBUG } else { settings.level().unwrap_or(Level::WARN) };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    if let Err(e) = run(cli, settings) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Pick the tenant database: `--db`, then `--tenant` or the configured default,
/// then the most recently used tenant, then a new "Default" tenant.
fn resolve_db_path(db: Option<PathBuf>, tenant: Option<String>, settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = db {
        return Ok(path);
    }
    let data_dir = &settings.data_dir;
    std::fs::create_dir_all(data_dir)?;

    if let Some(name) = tenant.or_else(|| settings.default_tenant.clone()) {
        return match find_tenant(data_dir, &name)? {
            Some(tenant) => Ok(tenant.file_path),
            None => Err(FirmError::Config(format!(
                "tenant '{}' not found; create it with `ft tenant new`",
                name
            ))),
        };
    }
    if let Some(tenant) = most_recent_tenant(data_dir)? {
        return Ok(tenant.file_path);
    }
    let tenant = Tenant::new("Default", data_dir);
    tenant.create_if_not_exists()?;
    Ok(tenant.file_path)
}

fn run(cli: Cli, settings: Settings) -> Result<()> {
    let Cli { db, tenant, me, command, .. } = cli;

    // Commands that don't need a tenant database
    let command = match command {
        Commands::Tenant { action } => {
            std::fs::create_dir_all(&settings.data_dir)?;
            return cmd_tenant(&settings.data_dir, action);
        }
        Commands::EndDate { frequency, start } => {
            cmd_end_date(&frequency, start);
            return Ok(());
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
            return Ok(());
        }
        other => other,
    };

    let db_path = resolve_db_path(db, tenant, &settings)?;
    debug!(path = %db_path.display(), "opening tenant database");
    let mut db = Database::load(&db_path)?;
    let policy = settings.recurrence_policy();
    let me = me.or(settings.current_user_id);

    match command {
        Commands::Tenant { .. } | Commands::EndDate { .. } | Commands::Completions { .. } => {
            unreachable!("handled above")
        }

        Commands::User { action } => cmd_named(&mut db, &db_path, NamedDirectory::User, action),
        Commands::Client { action } => cmd_named(&mut db, &db_path, NamedDirectory::Client, action),
        Commands::Service { action } => cmd_named(&mut db, &db_path, NamedDirectory::Service, action),
        Commands::Category { action } => cmd_named(&mut db, &db_path, NamedDirectory::Category, action),
        Commands::Entity { action } => cmd_entity(&mut db, &db_path, action),
        Commands::Status { action } => cmd_status(&mut db, &db_path, action),
        Commands::Rule { action } => cmd_rule(&mut db, &db_path, action),

        Commands::Add(args) => cmd_add(&mut db, &db_path, args),

        Commands::List { filters, json } => cmd_list(&db, me, filters, json),

        Commands::Metrics => cmd_metrics(&db, me),

        Commands::View { id } => cmd_view(&db, id),

        Commands::Update { id, details, next, due, assignee, task_type } =>
            cmd_update(&mut db, &db_path, id, details, next, due, assignee, task_type),

        Commands::Move { to, ids, from_status, assignee, client } =>
            cmd_move(&mut db, &db_path, &policy, to, ids, from_status, assignee, client),

        Commands::Complete { ids } => cmd_complete(&mut db, &db_path, &policy, ids),

        Commands::Rollover { id } => cmd_rollover(&mut db, &db_path, &policy, id),

        Commands::Export { output, filters } => cmd_export(&db, me, output, filters),

        Commands::Backup => cmd_backup(&db_path),
    }
}
