//! Task store and display helpers.
//!
//! This module provides the per-tenant `Database`: the task records it owns, the
//! workflow configuration and directories it reads, and every mutation the engine
//! allows on tasks. All payload validation happens here, before anything is
//! written. The display helpers used by the command handlers live here too.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compliance::{period_end, validate_compliance};
use crate::directory::{Directories, Directory};
use crate::error::{FirmError, Result};
use crate::filter::AdvancedFilters;
use crate::fields::*;
use crate::recurrence::{generate_next_recurrence, period_has_ended, RecurrencePolicy};
use crate::task::*;
use crate::workflow::*;

pub const MIN_DETAILS_LEN: usize = 5;

/// Everything stored for one tenant.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub statuses: Vec<TaskStatus>,
    #[serde(default)]
    pub workflow_rules: Vec<StatusWorkflowRule>,
    #[serde(default)]
    pub directory: Directories,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Database {
    /// Load the database from a JSON file. A missing file is an empty database.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Database::default());
        }
        let buf = fs::read_to_string(path)?;
        let db = serde_json::from_str(&buf)?;
        debug!(path = %path.display(), "loaded tenant database");
        Ok(db)
    }

    /// Save to a JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Next free task id.
    pub fn next_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn status(&self, id: u64) -> Option<&TaskStatus> {
        self.statuses.iter().find(|s| s.id == id)
    }

    /// Id of the highest-rank status.
    pub fn completed_status_id(&self) -> Option<u64> {
        completed_status(&self.statuses).map(|s| s.id)
    }

    /// Resolve a status given either as an id or as a name (case-insensitive).
    pub fn resolve_status(&self, identifier: &str) -> Result<u64> {
        if let Ok(id) = identifier.trim().parse::<u64>() {
            return self
                .status(id)
                .map(|s| s.id)
                .ok_or_else(|| FirmError::not_found("status", id));
        }
        self.statuses
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(identifier.trim()))
            .map(|s| s.id)
            .ok_or_else(|| FirmError::validation(format!("no status named '{}'", identifier)))
    }

    /// Tasks matching a compound key of status, assignee, client and type.
    pub fn find<'a>(&'a self, filters: &'a AdvancedFilters) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| filters.matches(t))
    }

    // ------------------------------------------------------------------
    // Workflow configuration
    // ------------------------------------------------------------------

    /// Add a status with a unique name, returning its id.
    pub fn add_status(&mut self, name: &str, rank: i32) -> Result<u64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FirmError::validation("status name cannot be empty"));
        }
        if self.statuses.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(FirmError::validation(format!("status '{}' already exists", name)));
        }
        let id = self.statuses.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.statuses.push(TaskStatus { id, name: name.to_string(), rank });
        Ok(id)
    }

    /// Remove an unused status together with the rules that mention it.
    pub fn remove_status(&mut self, id: u64) -> Result<()> {
        self.status(id).ok_or_else(|| FirmError::not_found("status", id))?;
        let in_use = self.tasks.iter().filter(|t| t.status_id == id).count();
        if in_use > 0 {
            return Err(FirmError::validation(format!("status {} is used by {} task(s)", id, in_use)));
        }
        self.statuses.retain(|s| s.id != id);
        self.workflow_rules.retain(|r| r.from_status_id != id && r.to_status_id != id);
        Ok(())
    }

    /// Set the rule for a (from, to) pair, replacing any existing one.
    pub fn set_rule(&mut self, from: u64, to: u64, is_allowed: bool) -> Result<()> {
        self.status(from).ok_or_else(|| FirmError::not_found("status", from))?;
        self.status(to).ok_or_else(|| FirmError::not_found("status", to))?;
        self.workflow_rules.retain(|r| !(r.from_status_id == from && r.to_status_id == to));
        self.workflow_rules.push(StatusWorkflowRule { from_status_id: from, to_status_id: to, is_allowed });
        Ok(())
    }

    /// Remove the rule for a (from, to) pair. Returns whether one existed.
    pub fn remove_rule(&mut self, from: u64, to: u64) -> bool {
        let before = self.workflow_rules.len();
        self.workflow_rules.retain(|r| !(r.from_status_id == from && r.to_status_id == to));
        self.workflow_rules.len() != before
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check a task payload against field rules and existing references.
    pub fn validate(&self, task: &NewTask) -> Result<()> {
        if task.task_details.trim().chars().count() < MIN_DETAILS_LEN {
            return Err(FirmError::validation(format!(
                "task details must be at least {} characters",
                MIN_DETAILS_LEN
            )));
        }
        let assignee = task.assignee_id.ok_or_else(|| FirmError::validation("an assignee is required"))?;
        self.directory.user_name(assignee).ok_or_else(|| FirmError::not_found("user", assignee))?;
        self.status(task.status_id).ok_or_else(|| FirmError::not_found("status", task.status_id))?;

        if let Some(revenue) = &task.revenue {
            self.directory
                .client_name(revenue.client_id)
                .ok_or_else(|| FirmError::not_found("client", revenue.client_id))?;
            let entity = self
                .directory
                .entity(revenue.entity_id)
                .ok_or_else(|| FirmError::not_found("entity", revenue.entity_id))?;
            if entity.client_id != revenue.client_id {
                return Err(FirmError::validation(format!(
                    "entity {} does not belong to client {}",
                    entity.id, revenue.client_id
                )));
            }
            self.directory
                .service_type_name(revenue.service_type_id)
                .ok_or_else(|| FirmError::not_found("service type", revenue.service_type_id))?;
            if let Some(category) = revenue.task_category_id {
                self.directory
                    .task_category_name(category)
                    .ok_or_else(|| FirmError::not_found("task category", category))?;
            }
            if let Some(compliance) = &revenue.compliance {
                validate_compliance(compliance)?;
            }
            if let Some(invoice) = &revenue.invoice {
                validate_invoice(invoice)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Task mutations
    // ------------------------------------------------------------------

    /// Validate and insert a new task, returning its id.
    ///
    /// A compliance end date is derived from the frequency and start date when
    /// none was given.
    pub fn create_task(&mut self, mut new: NewTask, now_utc: i64) -> Result<u64> {
        if let Some(c) = new.revenue.as_mut().and_then(|r| r.compliance.as_mut()) {
            if c.end_date.is_none() {
                if let (Some(f), Some(start)) = (c.frequency, c.start_date) {
                    c.end_date = period_end(f, start);
                }
            }
        }
        self.validate(&new)?;
        let id = self.next_id();
        self.tasks.push(Task::from_new(id, new, now_utc));
        info!(task_id = id, "created task");
        Ok(id)
    }

    /// Apply field changes to a task. Status changes go through `change_status`.
    pub fn update_task(&mut self, id: u64, patch: TaskPatch, now_utc: i64) -> Result<()> {
        let current = self.get(id).ok_or_else(|| FirmError::not_found("task", id))?;
        let updated = NewTask {
            task_type: patch.task_type.unwrap_or(current.task_type),
            assignee_id: patch.assignee_id.or(current.assignee_id),
            status_id: current.status_id,
            due_date: patch.due_date.unwrap_or(current.due_date),
            task_details: patch.task_details.unwrap_or_else(|| current.task_details.clone()),
            next_to_do: match patch.next_to_do {
                Some(n) if n.trim().is_empty() => None,
                Some(n) => Some(n),
                None => current.next_to_do.clone(),
            },
            revenue: current.revenue.clone(),
        };
        self.validate(&updated)?;

        let created_at_utc = current.created_at_utc;
        let mut task = Task::from_new(id, updated, created_at_utc);
        task.updated_at_utc = now_utc;
        if let Some(slot) = self.get_mut(id) {
            *slot = task;
        }
        info!(task_id = id, "updated task");
        Ok(())
    }

    /// Move one task to another status, subject to the workflow rules.
    ///
    /// Completing a recurring task generates the next period's task. If that
    /// fails the status change still stands and the failure is reported in the
    /// returned `StatusChange`.
    pub fn change_status(&mut self, id: u64, to: u64, policy: &RecurrencePolicy, now_utc: i64) -> Result<StatusChange> {
        let from = self.get(id).ok_or_else(|| FirmError::not_found("task", id))?.status_id;
        self.status(to).ok_or_else(|| FirmError::not_found("status", to))?;

        if let Transition::Reject(reason) = validate_status_transition(from, to, &self.workflow_rules) {
            warn!(task_id = id, from, to, %reason, "status change rejected");
            return Err(FirmError::TransitionRejected { task_id: id, reason });
        }

        let task = self.get_mut(id).ok_or_else(|| FirmError::not_found("task", id))?;
        task.status_id = to;
        task.updated_at_utc = now_utc;
        let recurs = task.is_open_for_recurrence();
        info!(task_id = id, from, to, "status changed");

        let mut change = StatusChange {
            task_id: id,
            from_status_id: from,
            to_status_id: to,
            next_task_id: None,
            recurrence_error: None,
        };
        if recurs && self.completed_status_id() == Some(to) {
            match self.roll_over(id, policy, now_utc) {
                Ok(next) => change.next_task_id = Some(next),
                Err(e) => {
                    warn!(task_id = id, error = %e, "recurrence did not fire");
                    change.recurrence_error = Some(e.to_string());
                }
            }
        }
        Ok(change)
    }

    /// Move several tasks independently. Earlier successes are kept when a
    /// later task is rejected or fails.
    pub fn change_statuses(&mut self, ids: &[u64], to: u64, policy: &RecurrencePolicy, now_utc: i64) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for &id in ids {
            match self.change_status(id, to, policy, now_utc) {
                Ok(change) => outcome.updated.push(change),
                Err(FirmError::TransitionRejected { reason, .. }) => outcome.rejected.push((id, reason)),
                Err(e) => outcome.failed.push((id, e.to_string())),
            }
        }
        outcome
    }

    /// Generate the next period's task for a recurring task, at most once.
    ///
    /// If a successor for the same period already exists its id is returned and
    /// nothing new is inserted.
    pub fn roll_over(&mut self, id: u64, policy: &RecurrencePolicy, now_utc: i64) -> Result<u64> {
        let task = self.get(id).ok_or_else(|| FirmError::not_found("task", id))?;
        if task.compliance().is_some_and(|c| c.rolled_over) {
            return Err(FirmError::recurrence(id, "next period was already generated"));
        }
        let initial = initial_status(&self.statuses)
            .ok_or_else(|| FirmError::recurrence(id, "tenant has no task statuses"))?
            .id;
        let next = generate_next_recurrence(task, initial, policy)?;

        let next_start = next.revenue.as_ref().and_then(|r| r.compliance.as_ref()).and_then(|c| c.start_date);
        let existing = self
            .tasks
            .iter()
            .find(|t| {
                t.revenue.as_ref().is_some_and(|r| r.recurred_from == Some(id))
                    && t.compliance().and_then(|c| c.start_date) == next_start
            })
            .map(|t| t.id);

        let next_id = match existing {
            Some(existing) => {
                debug!(task_id = id, next_task_id = existing, "next period already present");
                existing
            }
            None => {
                self.validate(&next)?;
                let next_id = self.next_id();
                self.tasks.push(Task::from_new(next_id, next, now_utc));
                info!(task_id = id, next_task_id = next_id, "generated next compliance period");
                next_id
            }
        };

        if let Some(c) = self.get_mut(id).and_then(|t| t.revenue.as_mut()).and_then(|r| r.compliance.as_mut()) {
            c.rolled_over = true;
        }
        Ok(next_id)
    }

    /// Roll over every completed recurring task whose period has ended.
    ///
    /// Meant to be driven by a periodic trigger. Each task succeeds or fails on
    /// its own.
    pub fn roll_over_due(&mut self, policy: &RecurrencePolicy, now: NaiveDateTime, now_utc: i64) -> Vec<(u64, Result<u64>)> {
        let completed = self.completed_status_id();
        let due: Vec<u64> = self
            .tasks
            .iter()
            .filter(|t| Some(t.status_id) == completed && t.is_open_for_recurrence() && period_has_ended(t, now))
            .map(|t| t.id)
            .collect();
        due.into_iter()
            .map(|id| {
                let result = self.roll_over(id, policy, now_utc);
                if let Err(e) = &result {
                    warn!(task_id = id, error = %e, "rollover failed");
                }
                (id, result)
            })
            .collect()
    }
}

/// ISO 4217-shaped currency code and a non-negative finite rate.
pub fn validate_invoice(invoice: &Invoice) -> Result<()> {
    let code = &invoice.currency;
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(FirmError::validation(format!("currency '{}' is not an ISO 4217 code", code)));
    }
    if !invoice.service_rate.is_finite() || invoice.service_rate < 0.0 {
        return Err(FirmError::validation("service rate must be zero or more"));
    }
    Ok(())
}

/// Parse human-readable due date input.
///
/// Supports "today", "tomorrow", "yesterday", "end of week", "end of month",
/// "in 3d", "in 2w" and ISO `YYYY-MM-DD`.
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => return Some(start_end_of_this_week(today).1),
        "end of month" | "eom" => return crate::compliance::last_day_of_month_after(today, 0),
        _ => {}
    }
    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Duration::try_days(days).and_then(|d| today.checked_add_signed(d));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Duration::try_weeks(weeks).and_then(|w| today.checked_add_signed(w));
            }
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Monday and Sunday of the ISO week containing `today`.
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    (start, start + Duration::days(6))
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: NaiveDate, today: NaiveDate) -> String {
    let days = (due - today).num_days();
    match days {
        0 => "today".into(),
        1 => "tomorrow".into(),
        d if d > 1 => format!("in {}d", d),
        d => format!("{}d late", -d),
    }
}

/// Display label for a task type.
pub fn format_task_type(t: TaskType) -> &'static str {
    match t {
        TaskType::Regular => "Regular",
        TaskType::Medium => "Medium",
        TaskType::Urgent => "Urgent",
    }
}

/// Print tasks as a table, resolving ids through the tenant's directories.
pub fn print_table(db: &Database, tasks: &[&Task]) {
    println!(
        "{:<5} {:<8} {:<14} {:<12} {:<14} {:<16} {}",
        "ID", "Type", "Status", "Due", "Assignee", "Client", "Details"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let status = db.status(t.status_id).map(|s| s.name.as_str()).unwrap_or("?");
        let assignee = t.assignee_id.and_then(|u| db.directory.user_name(u)).unwrap_or("-");
        let client = match t.client_id() {
            Some(c) => db.directory.client_name(c).unwrap_or("?"),
            None => "(admin)",
        };
        println!(
            "{:<5} {:<8} {:<14} {:<12} {:<14} {:<16} {}",
            t.id,
            format_task_type(t.task_type),
            truncate(status, 14),
            format_due_relative(t.due_date, today),
            truncate(assignee, 14),
            truncate(client, 16),
            t.task_details
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
