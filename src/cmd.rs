//! Command implementations for the CLI interface.
//!
//! This module contains the handlers behind every `ft` subcommand: tenant and
//! directory setup, workflow configuration, task creation and updates, status
//! changes, recurrence rollover, listing with filters and metrics, and CSV export.

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate, TimeZone, Utc};
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing::info;

use crate::compliance::compute_compliance_end_date;
use crate::db::*;
use crate::directory::Directory;
use crate::error::{FirmError, Result};
use crate::fields::*;
use crate::filter::{AdvancedFilters, FilterState, Metrics, TaskQuery};
use crate::recurrence::RecurrencePolicy;
use crate::task::*;
use crate::tenant::{create_tenant, discover_tenants};
use crate::workflow::{initial_status, BulkOutcome};

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tenants (one database file each).
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },

    /// Manage staff users.
    User {
        #[command(subcommand)]
        action: NamedAction,
    },

    /// Manage clients.
    Client {
        #[command(subcommand)]
        action: NamedAction,
    },

    /// Manage client entities.
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },

    /// Manage service types.
    Service {
        #[command(subcommand)]
        action: NamedAction,
    },

    /// Manage task categories.
    Category {
        #[command(subcommand)]
        action: NamedAction,
    },

    /// Manage task statuses. The highest rank is the completed status.
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },

    /// Manage status workflow rules.
    Rule {
        #[command(subcommand)]
        action: RuleAction,
    },

    /// Add a new task. Giving --client makes it a revenue task.
    Add(AddArgs),

    /// List tasks with optional filters, followed by metrics.
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show task counts by bucket.
    Metrics,

    /// View a single task.
    View {
        id: u64,
    },

    /// Update fields on a task.
    Update {
        id: u64,
        #[arg(long)]
        details: Option<String>,
        /// Next step note. Pass an empty string to clear.
        #[arg(long)]
        next: Option<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "in Nd", "eom".
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        assignee: Option<u64>,
        #[arg(long = "type", value_enum)]
        task_type: Option<TaskType>,
    },

    /// Move tasks to a status. Each task is checked against the workflow rules
    /// on its own.
    Move {
        /// Target status id or name.
        to: String,
        /// Task ids to move.
        ids: Vec<u64>,
        /// Select every task currently in this status.
        #[arg(long)]
        from_status: Option<String>,
        /// Select every task assigned to this user.
        #[arg(long)]
        assignee: Option<u64>,
        /// Select every task for this client.
        #[arg(long)]
        client: Option<u64>,
    },

    /// Move tasks to the completed status.
    Complete {
        ids: Vec<u64>,
    },

    /// Generate next-period tasks for completed recurring tasks whose period
    /// has ended, or for one task with --id.
    Rollover {
        #[arg(long)]
        id: Option<u64>,
    },

    /// Compute the compliance end date for a frequency and start date.
    EndDate {
        /// Frequency label, e.g. "Quarterly" or "3 Years".
        frequency: String,
        /// Start date (YYYY-MM-DD).
        start: NaiveDate,
    },

    /// Export tasks to CSV.
    Export {
        /// Output file path (default: tasks.csv).
        #[arg(long, short)]
        output: Option<String>,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Create a timestamped backup of the tenant database.
    Backup,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TenantAction {
    /// Create a tenant.
    New { name: String },
    /// List tenants.
    List,
}

#[derive(Subcommand)]
pub enum NamedAction {
    /// Add a record.
    Add { name: String },
    /// List records.
    List,
}

#[derive(Subcommand)]
pub enum EntityAction {
    /// Add an entity under a client.
    Add { client: u64, name: String },
    /// List entities.
    List {
        #[arg(long)]
        client: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum StatusAction {
    /// Add a status.
    Add {
        name: String,
        #[arg(long)]
        rank: i32,
    },
    /// List statuses by rank.
    List,
    /// Remove an unused status.
    Remove { status: String },
}

#[derive(Subcommand)]
pub enum RuleAction {
    /// Explicitly allow a transition.
    Allow { from: String, to: String },
    /// Forbid a transition.
    Deny { from: String, to: String },
    /// Remove the rule for a transition (it becomes allowed).
    Remove { from: String, to: String },
    /// List rules.
    List,
}

#[derive(Args)]
pub struct AddArgs {
    /// What needs doing (at least 5 characters).
    pub details: String,
    /// Assigned user id.
    #[arg(long)]
    pub assignee: u64,
    /// Due date: YYYY-MM-DD, "today", "tomorrow", "in Nd", "eom".
    #[arg(long)]
    pub due: String,
    #[arg(long = "type", value_enum, default_value_t = TaskType::Regular)]
    pub task_type: TaskType,
    /// Initial status id or name (default: lowest rank).
    #[arg(long)]
    pub status: Option<String>,
    /// Next step note.
    #[arg(long)]
    pub next: Option<String>,
    /// Client id. Required for revenue tasks.
    #[arg(long)]
    pub client: Option<u64>,
    #[arg(long, requires = "client")]
    pub entity: Option<u64>,
    #[arg(long, requires = "client")]
    pub service: Option<u64>,
    #[arg(long, requires = "client")]
    pub category: Option<u64>,
    /// Compliance frequency, e.g. "Annual", "Bi-Annually", "2 Years".
    #[arg(long, requires = "client")]
    pub frequency: Option<ComplianceFrequency>,
    /// Compliance year(s), comma-separated.
    #[arg(long, requires = "client")]
    pub year: Option<String>,
    /// Compliance period start (YYYY-MM-DD).
    #[arg(long, requires = "client")]
    pub start: Option<NaiveDate>,
    /// Compliance period end (YYYY-MM-DD); derived from frequency when omitted.
    #[arg(long, requires = "client")]
    pub end: Option<NaiveDate>,
    /// Generate the next period's task when this one completes.
    #[arg(long, requires = "client")]
    pub recurring: bool,
    /// Invoice currency (ISO 4217).
    #[arg(long, requires_all = ["client", "rate"])]
    pub currency: Option<String>,
    /// Service rate.
    #[arg(long, requires_all = ["client", "currency"])]
    pub rate: Option<f64>,
}

#[derive(Args)]
pub struct FilterArgs {
    /// Quick filter.
    #[arg(long, value_enum, default_value_t = QuickFilter::All)]
    pub quick: QuickFilter,
    /// Case-insensitive text matched against details, client and assignee names.
    #[arg(long)]
    pub search: Option<String>,
    /// Status id or name.
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub assignee: Option<u64>,
    #[arg(long)]
    pub client: Option<u64>,
    #[arg(long = "type", value_enum)]
    pub task_type: Option<TaskType>,
}

impl FilterArgs {
    /// Resolve the status name and assemble the filter state for a query.
    pub fn to_state(&self, db: &Database) -> Result<FilterState> {
        let status_id = match &self.status {
            Some(s) => Some(db.resolve_status(s)?),
            None => None,
        };
        Ok(FilterState {
            quick: self.quick,
            search: self.search.clone().unwrap_or_default(),
            advanced: AdvancedFilters {
                status_id,
                assignee_id: self.assignee,
                client_id: self.client,
                task_type: self.task_type,
            },
        })
    }
}

fn now_utc() -> i64 {
    Utc::now().timestamp()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Create or list tenants.
pub fn cmd_tenant(data_dir: &Path, action: TenantAction) -> Result<()> {
    match action {
        TenantAction::New { name } => {
            let tenant = create_tenant(&name, data_dir)?;
            println!("Created tenant '{}' at {}", tenant.display_name, tenant.file_path.display());
        }
        TenantAction::List => {
            let tenants = discover_tenants(data_dir)?;
            if tenants.is_empty() {
                println!("No tenants found in {}", data_dir.display());
                return Ok(());
            }
            for tenant in tenants {
                println!("{:<24} {}", truncate(&tenant.display_name, 24), tenant.file_path.display());
            }
        }
    }
    Ok(())
}

/// Which directory a `NamedAction` applies to.
#[derive(Clone, Copy)]
pub enum NamedDirectory {
    User,
    Client,
    Service,
    Category,
}

/// Add to or list one of the name-only directories.
pub fn cmd_named(db: &mut Database, db_path: &Path, which: NamedDirectory, action: NamedAction) -> Result<()> {
    match action {
        NamedAction::Add { name } => {
            if name.trim().is_empty() {
                return Err(FirmError::validation("name cannot be empty"));
            }
            let dir = &mut db.directory;
            let id = match which {
                NamedDirectory::User => dir.add_user(&name),
                NamedDirectory::Client => dir.add_client(&name),
                NamedDirectory::Service => dir.add_service_type(&name),
                NamedDirectory::Category => dir.add_task_category(&name),
            };
            db.save(db_path)?;
            println!("Added {} {}", id, name.trim());
        }
        NamedAction::List => {
            let dir = &db.directory;
            let rows: Vec<(u64, &str)> = match which {
                NamedDirectory::User => dir.users.iter().map(|r| (r.id, r.name.as_str())).collect(),
                NamedDirectory::Client => dir.clients.iter().map(|r| (r.id, r.name.as_str())).collect(),
                NamedDirectory::Service => dir.service_types.iter().map(|r| (r.id, r.name.as_str())).collect(),
                NamedDirectory::Category => dir.task_categories.iter().map(|r| (r.id, r.name.as_str())).collect(),
            };
            println!("{:<5} {}", "ID", "Name");
            for (id, name) in rows {
                println!("{:<5} {}", id, name);
            }
        }
    }
    Ok(())
}

/// Add or list client entities.
pub fn cmd_entity(db: &mut Database, db_path: &Path, action: EntityAction) -> Result<()> {
    match action {
        EntityAction::Add { client, name } => {
            if name.trim().is_empty() {
                return Err(FirmError::validation("name cannot be empty"));
            }
            let id = db
                .directory
                .add_entity(client, &name)
                .ok_or_else(|| FirmError::not_found("client", client))?;
            db.save(db_path)?;
            println!("Added entity {} for client {}", id, client);
        }
        EntityAction::List { client } => {
            println!("{:<5} {:<20} {}", "ID", "Client", "Name");
            for e in db.directory.entities.iter().filter(|e| client.map_or(true, |c| e.client_id == c)) {
                let client_name = db.directory.client_name(e.client_id).unwrap_or("?");
                println!("{:<5} {:<20} {}", e.id, truncate(client_name, 20), e.name);
            }
        }
    }
    Ok(())
}

/// Add, list or remove task statuses.
pub fn cmd_status(db: &mut Database, db_path: &Path, action: StatusAction) -> Result<()> {
    match action {
        StatusAction::Add { name, rank } => {
            let id = db.add_status(&name, rank)?;
            db.save(db_path)?;
            println!("Added status {} '{}' (rank {})", id, name.trim(), rank);
        }
        StatusAction::List => {
            let completed = db.completed_status_id();
            let initial = initial_status(&db.statuses).map(|s| s.id);
            let mut statuses: Vec<&TaskStatus> = db.statuses.iter().collect();
            statuses.sort_by_key(|s| (s.rank, s.id));
            println!("{:<5} {:<6} {:<20} {}", "ID", "Rank", "Name", "Role");
            for s in statuses {
                let role = if Some(s.id) == completed {
                    "completed"
                } else if Some(s.id) == initial {
                    "initial"
                } else {
                    ""
                };
                println!("{:<5} {:<6} {:<20} {}", s.id, s.rank, truncate(&s.name, 20), role);
            }
        }
        StatusAction::Remove { status } => {
            let id = db.resolve_status(&status)?;
            db.remove_status(id)?;
            db.save(db_path)?;
            println!("Removed status {}", id);
        }
    }
    Ok(())
}

/// Allow, deny, remove or list status workflow rules.
pub fn cmd_rule(db: &mut Database, db_path: &Path, action: RuleAction) -> Result<()> {
    match action {
        RuleAction::Allow { from, to } => {
            let (from, to) = (db.resolve_status(&from)?, db.resolve_status(&to)?);
            db.set_rule(from, to, true)?;
            db.save(db_path)?;
            println!("Allowed {} -> {}", from, to);
        }
        RuleAction::Deny { from, to } => {
            let (from, to) = (db.resolve_status(&from)?, db.resolve_status(&to)?);
            db.set_rule(from, to, false)?;
            db.save(db_path)?;
            println!("Denied {} -> {}", from, to);
        }
        RuleAction::Remove { from, to } => {
            let (from, to) = (db.resolve_status(&from)?, db.resolve_status(&to)?);
            if db.remove_rule(from, to) {
                db.save(db_path)?;
                println!("Removed rule {} -> {}", from, to);
            } else {
                println!("No rule for {} -> {}", from, to);
            }
        }
        RuleAction::List => {
            if db.workflow_rules.is_empty() {
                println!("No workflow rules: every transition is allowed.");
                return Ok(());
            }
            let name = |id: u64| db.status(id).map(|s| s.name.clone()).unwrap_or_else(|| id.to_string());
            for r in &db.workflow_rules {
                println!(
                    "{:<20} -> {:<20} {}",
                    truncate(&name(r.from_status_id), 20),
                    truncate(&name(r.to_status_id), 20),
                    if r.is_allowed { "allowed" } else { "denied" }
                );
            }
        }
    }
    Ok(())
}

/// Build a task payload from the add arguments.
pub fn new_task_from_args(db: &Database, args: AddArgs, today: NaiveDate) -> Result<NewTask> {
    let due_date = parse_due_input(&args.due, today).ok_or_else(|| {
        FirmError::validation("unrecognised due date; use YYYY-MM-DD, 'today', 'tomorrow', 'in Nd' or 'eom'")
    })?;
    let status_id = match &args.status {
        Some(s) => db.resolve_status(s)?,
        None => {
            initial_status(&db.statuses)
                .ok_or_else(|| FirmError::validation("tenant has no statuses; add one with `ft status add`"))?
                .id
        }
    };

    let revenue = match args.client {
        None => None,
        Some(client_id) => {
            let entity_id = args.entity.ok_or_else(|| FirmError::validation("revenue tasks need --entity"))?;
            let service_type_id = args.service.ok_or_else(|| FirmError::validation("revenue tasks need --service"))?;
            let has_compliance = args.frequency.is_some() || args.year.is_some() || args.start.is_some() || args.recurring;
            let compliance = has_compliance.then(|| Compliance {
                frequency: args.frequency,
                year: args.year.clone(),
                start_date: args.start,
                end_date: args.end.and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999)),
                is_recurring: args.recurring,
                rolled_over: false,
            });
            let invoice = match (args.currency, args.rate) {
                (Some(currency), Some(service_rate)) => Some(Invoice { currency: currency.trim().to_uppercase(), service_rate }),
                _ => None,
            };
            Some(RevenueDetails {
                client_id,
                entity_id,
                service_type_id,
                task_category_id: args.category,
                compliance,
                invoice,
                recurred_from: None,
            })
        }
    };

    Ok(NewTask {
        task_type: args.task_type,
        assignee_id: Some(args.assignee),
        status_id,
        due_date,
        task_details: args.details.trim().to_string(),
        next_to_do: args.next.filter(|n| !n.trim().is_empty()),
        revenue,
    })
}

/// Validate and store a new task.
pub fn cmd_add(db: &mut Database, db_path: &Path, args: AddArgs) -> Result<()> {
    let new = new_task_from_args(db, args, today())?;
    let id = db.create_task(new, now_utc())?;
    db.save(db_path)?;
    println!("Added task {}", id);
    Ok(())
}

#[derive(Serialize)]
struct ListOutput<'a> {
    tasks: Vec<&'a Task>,
    metrics: Metrics,
}

fn print_metrics(m: &Metrics) {
    println!(
        "total {} | pending {} | completed {} | overdue {} | due today {} | high {} | mine {}",
        m.total, m.pending, m.completed, m.overdue, m.due_today, m.high_priority, m.my_tasks
    );
}

/// Print the visible tasks and the tenant-wide metrics.
pub fn cmd_list(db: &Database, current_user: Option<u64>, filters: FilterArgs, json: bool) -> Result<()> {
    let state = filters.to_state(db)?;
    let now = Local::now().naive_local();
    let query = TaskQuery::new(&db.tasks, &db.statuses, &db.directory, current_user, state, now);
    let visible: Vec<&Task> = query.visible().collect();
    let metrics = query.metrics();

    if json {
        println!("{}", serde_json::to_string_pretty(&ListOutput { tasks: visible, metrics })?);
        return Ok(());
    }
    print_table(db, &visible);
    println!();
    print_metrics(&metrics);
    Ok(())
}

/// Print the metrics line on its own.
pub fn cmd_metrics(db: &Database, current_user: Option<u64>) -> Result<()> {
    let now = Local::now().naive_local();
    let query = TaskQuery::new(&db.tasks, &db.statuses, &db.directory, current_user, FilterState::default(), now);
    print_metrics(&query.metrics());
    Ok(())
}

/// Print every field of one task with names resolved.
pub fn cmd_view(db: &Database, id: u64) -> Result<()> {
    let task = db.get(id).ok_or_else(|| FirmError::not_found("task", id))?;
    let dir = &db.directory;
    let or_dash = |s: Option<&str>| s.unwrap_or("-").to_string();
    let timestamp = |t: i64| {
        Utc.timestamp_opt(t, 0)
            .single()
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| t.to_string())
    };

    println!("ID:           {}", task.id);
    println!("Kind:         {}", if task.is_admin() { "Admin" } else { "Revenue" });
    println!("Type:         {}", format_task_type(task.task_type));
    println!("Status:       {}", or_dash(db.status(task.status_id).map(|s| s.name.as_str())));
    println!("Assignee:     {}", or_dash(task.assignee_id.and_then(|u| dir.user_name(u))));
    println!("Due:          {} ({})", task.due_date, format_due_relative(task.due_date, today()));
    println!("Details:      {}", task.task_details);
    println!("Next to do:   {}", or_dash(task.next_to_do.as_deref()));

    if let Some(r) = &task.revenue {
        println!("Client:       {}", or_dash(dir.client_name(r.client_id)));
        println!("Entity:       {}", or_dash(dir.entity(r.entity_id).map(|e| e.name.as_str())));
        println!("Service:      {}", or_dash(dir.service_type_name(r.service_type_id)));
        println!("Category:     {}", or_dash(r.task_category_id.and_then(|c| dir.task_category_name(c))));
        if let Some(c) = &r.compliance {
            println!("Frequency:    {}", or_dash(c.frequency.map(|f| f.label())));
            println!("Year:         {}", or_dash(c.year.as_deref()));
            println!("Period:       {} to {}",
                c.start_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                c.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()));
            println!("Recurring:    {}{}", c.is_recurring, if c.rolled_over { " (next period generated)" } else { "" });
        }
        if let Some(i) = &r.invoice {
            println!("Rate:         {} {:.2}", i.currency, i.service_rate);
        }
        if let Some(from) = r.recurred_from {
            println!("Recurred from: {}", from);
        }
    }
    println!("Created UTC:  {}", timestamp(task.created_at_utc));
    println!("Updated UTC:  {}", timestamp(task.updated_at_utc));
    Ok(())
}

/// Patch fields on a task. Status is changed with `move`.
pub fn cmd_update(
    db: &mut Database,
    db_path: &Path,
    id: u64,
    details: Option<String>,
    next: Option<String>,
    due: Option<String>,
    assignee: Option<u64>,
    task_type: Option<TaskType>,
) -> Result<()> {
    let due_date = match due {
        Some(d) => Some(parse_due_input(&d, today()).ok_or_else(|| FirmError::validation("unrecognised due date"))?),
        None => None,
    };
    let patch = TaskPatch {
        task_type,
        assignee_id: assignee,
        due_date,
        task_details: details.map(|d| d.trim().to_string()),
        next_to_do: next,
    };
    db.update_task(id, patch, now_utc())?;
    db.save(db_path)?;
    println!("Updated task {}", id);
    Ok(())
}

fn print_outcome(outcome: &BulkOutcome) {
    for change in &outcome.updated {
        print!("  {} moved {} -> {}", change.task_id, change.from_status_id, change.to_status_id);
        if let Some(next) = change.next_task_id {
            print!(" (next period: task {})", next);
        }
        if let Some(err) = &change.recurrence_error {
            print!(" (recurrence failed: {})", err);
        }
        println!();
    }
    for (id, reason) in &outcome.rejected {
        println!("  {} rejected: {}", id, reason);
    }
    for (id, err) in &outcome.failed {
        println!("  {} failed: {}", id, err);
    }
    println!(
        "{} moved, {} rejected, {} failed.",
        outcome.updated.len(),
        outcome.rejected.len(),
        outcome.failed.len()
    );
}

/// Move tasks picked by id and/or by a compound selector to one status.
pub fn cmd_move(
    db: &mut Database,
    db_path: &Path,
    policy: &RecurrencePolicy,
    to: String,
    mut ids: Vec<u64>,
    from_status: Option<String>,
    assignee: Option<u64>,
    client: Option<u64>,
) -> Result<()> {
    let to = db.resolve_status(&to)?;
    if from_status.is_some() || assignee.is_some() || client.is_some() {
        let selector = AdvancedFilters {
            status_id: match from_status {
                Some(s) => Some(db.resolve_status(&s)?),
                None => None,
            },
            assignee_id: assignee,
            client_id: client,
            task_type: None,
        };
        ids.extend(db.find(&selector).map(|t| t.id));
    }
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        println!("No tasks selected.");
        return Ok(());
    }

    let outcome = db.change_statuses(&ids, to, policy, now_utc());
    if !outcome.updated.is_empty() {
        db.save(db_path)?;
    }
    info!(moved = outcome.updated.len(), rejected = outcome.rejected.len(), failed = outcome.failed.len(), "bulk move");
    print_outcome(&outcome);
    Ok(())
}

/// Move tasks to the completed (highest rank) status.
pub fn cmd_complete(db: &mut Database, db_path: &Path, policy: &RecurrencePolicy, ids: Vec<u64>) -> Result<()> {
    let done = db
        .completed_status_id()
        .ok_or_else(|| FirmError::validation("tenant has no statuses"))?;
    cmd_move(db, db_path, policy, done.to_string(), ids, None, None, None)
}

/// Roll over one task, or every completed recurring task whose period has ended.
pub fn cmd_rollover(db: &mut Database, db_path: &Path, policy: &RecurrencePolicy, id: Option<u64>) -> Result<()> {
    if let Some(id) = id {
        let next = db.roll_over(id, policy, now_utc())?;
        db.save(db_path)?;
        println!("Task {} rolled over into task {}", id, next);
        return Ok(());
    }

    let results = db.roll_over_due(policy, Local::now().naive_local(), now_utc());
    if results.is_empty() {
        println!("Nothing to roll over.");
        return Ok(());
    }
    let mut generated = 0;
    for (id, result) in &results {
        match result {
            Ok(next) => {
                generated += 1;
                println!("  {} -> {}", id, next);
            }
            Err(e) => println!("  {} failed: {}", id, e),
        }
    }
    if generated > 0 {
        db.save(db_path)?;
    }
    println!("Rolled over {}/{} task(s).", generated, results.len());
    Ok(())
}

/// Print the compliance end date for a frequency label and start date.
pub fn cmd_end_date(frequency: &str, start: NaiveDate) {
    match compute_compliance_end_date(frequency, start) {
        Some(end) => println!("{}", end.format("%Y-%m-%dT%H:%M:%S%.3f")),
        None => println!("No end date: '{}' is not a recognised frequency; enter it manually.", frequency),
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Render the tasks selected by `state` as CSV.
pub fn tasks_to_csv(db: &Database, current_user: Option<u64>, state: FilterState, today: NaiveDate) -> (String, usize) {
    let now = today.and_hms_opt(12, 0, 0).unwrap_or_default();
    let query = TaskQuery::new(&db.tasks, &db.statuses, &db.directory, current_user, state, now);
    let dir = &db.directory;

    let mut csv = String::from(
        "ID,Kind,Type,Status,Assignee,Client,Entity,Service,Due,Frequency,Year,Start,End,Recurring,Currency,Rate,Details\n",
    );
    let mut count = 0;
    for t in query.visible() {
        let status = db.status(t.status_id).map(|s| s.name.as_str()).unwrap_or("-");
        let assignee = t.assignee_id.and_then(|u| dir.user_name(u)).unwrap_or("-");
        let r = t.revenue.as_ref();
        let c = t.compliance();
        let i = r.and_then(|r| r.invoice.as_ref());
        let fields = [
            t.id.to_string(),
            if t.is_admin() { "Admin" } else { "Revenue" }.to_string(),
            format_task_type(t.task_type).to_string(),
            status.to_string(),
            assignee.to_string(),
            r.and_then(|r| dir.client_name(r.client_id)).unwrap_or("-").to_string(),
            r.and_then(|r| dir.entity(r.entity_id)).map(|e| e.name.as_str()).unwrap_or("-").to_string(),
            r.and_then(|r| dir.service_type_name(r.service_type_id)).unwrap_or("-").to_string(),
            t.due_date.to_string(),
            c.and_then(|c| c.frequency).map(|f| f.label()).unwrap_or("-").to_string(),
            c.and_then(|c| c.year.clone()).unwrap_or_else(|| "-".into()),
            c.and_then(|c| c.start_date).map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            c.and_then(|c| c.end_date).map(|d| d.date().to_string()).unwrap_or_else(|| "-".into()),
            c.map(|c| c.is_recurring.to_string()).unwrap_or_else(|| "-".into()),
            i.map(|i| i.currency.clone()).unwrap_or_else(|| "-".into()),
            i.map(|i| format!("{:.2}", i.service_rate)).unwrap_or_else(|| "-".into()),
            t.task_details.clone(),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
        count += 1;
    }
    (csv, count)
}

/// Write the filtered tasks to a CSV file.
pub fn cmd_export(db: &Database, current_user: Option<u64>, output: Option<String>, filters: FilterArgs) -> Result<()> {
    let output_path = output.unwrap_or_else(|| "tasks.csv".to_string());
    let state = filters.to_state(db)?;
    let (csv, count) = tasks_to_csv(db, current_user, state, today());
    fs::write(&output_path, csv)?;
    println!("Exported {} task(s) to {}", count, output_path);
    Ok(())
}

/// Copy the database file into `backup/` next to it with a timestamped name.
pub fn create_backup(db_path: &Path) -> Result<String> {
    if !db_path.exists() {
        return Err(FirmError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "database file does not exist",
        )));
    }
    let parent_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent_dir.join("backup");
    fs::create_dir_all(&backup_dir)?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let db_filename = db_path.file_name().and_then(|n| n.to_str()).unwrap_or("firm.json");
    let backup_path = backup_dir.join(format!("{}_{}", timestamp, db_filename));
    fs::copy(db_path, &backup_path)?;
    Ok(backup_path.to_string_lossy().to_string())
}

/// Back up the current tenant database.
pub fn cmd_backup(db_path: &Path) -> Result<()> {
    let path = create_backup(db_path)?;
    println!("Backup created: {}", path);
    Ok(())
}

/// Print a shell completion script to stdout.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
