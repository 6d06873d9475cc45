//! Task data structures and tenant workflow configuration records.
//!
//! This module defines the `Task` record owned by the task store, the revenue-only
//! metadata it may carry, and the read-only `TaskStatus` / `StatusWorkflowRule`
//! records configured by tenant administrators.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// A unit of work, either administrative or revenue generating.
///
/// A task is a revenue task exactly when `revenue` is present; administrative
/// tasks therefore cannot carry client, entity, service, compliance or invoice
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,
    #[serde(default)]
    pub task_type: TaskType,
    pub assignee_id: Option<u64>,
    pub status_id: u64,
    pub due_date: NaiveDate,
    pub task_details: String,
    #[serde(default)]
    pub next_to_do: Option<String>,
    #[serde(default)]
    pub revenue: Option<RevenueDetails>,
    pub created_at_utc: i64,
    pub updated_at_utc: i64,
}

impl Task {
    pub fn from_new(id: u64, new: NewTask, now_utc: i64) -> Self {
        Task {
            id,
            task_type: new.task_type,
            assignee_id: new.assignee_id,
            status_id: new.status_id,
            due_date: new.due_date,
            task_details: new.task_details,
            next_to_do: new.next_to_do,
            revenue: new.revenue,
            created_at_utc: now_utc,
            updated_at_utc: now_utc,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.revenue.is_none()
    }

    pub fn client_id(&self) -> Option<u64> {
        self.revenue.as_ref().map(|r| r.client_id)
    }

    pub fn compliance(&self) -> Option<&Compliance> {
        self.revenue.as_ref().and_then(|r| r.compliance.as_ref())
    }

    /// Whether this task still owes a next-period task.
    pub fn is_open_for_recurrence(&self) -> bool {
        self.compliance().is_some_and(|c| c.is_recurring && !c.rolled_over)
    }
}

/// Client linkage and billing metadata carried only by revenue tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueDetails {
    pub client_id: u64,
    pub entity_id: u64,
    pub service_type_id: u64,
    #[serde(default)]
    pub task_category_id: Option<u64>,
    #[serde(default)]
    pub compliance: Option<Compliance>,
    #[serde(default)]
    pub invoice: Option<Invoice>,
    /// Template task this one was generated from by recurrence.
    #[serde(default)]
    pub recurred_from: Option<u64>,
}

/// Compliance period of a revenue task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Compliance {
    pub frequency: Option<ComplianceFrequency>,
    /// Comma-separated 4-digit years, e.g. "2024" or "2024,2025,2026".
    pub year: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_recurring: bool,
    /// Set once the next-period task has been generated.
    #[serde(default)]
    pub rolled_over: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    /// ISO 4217 code.
    pub currency: String,
    pub service_rate: f64,
}

/// Tenant-configured workflow state. The status with the highest rank is the
/// completed state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskStatus {
    pub id: u64,
    pub name: String,
    pub rank: i32,
}

/// Optional transition constraint between two statuses. Pairs without a rule
/// are allowed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusWorkflowRule {
    pub from_status_id: u64,
    pub to_status_id: u64,
    pub is_allowed: bool,
}

/// Task payload before the store assigns an id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub task_type: TaskType,
    pub assignee_id: Option<u64>,
    pub status_id: u64,
    pub due_date: NaiveDate,
    pub task_details: String,
    pub next_to_do: Option<String>,
    pub revenue: Option<RevenueDetails>,
}

/// Field changes for an existing task; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub task_type: Option<TaskType>,
    pub assignee_id: Option<u64>,
    pub due_date: Option<NaiveDate>,
    pub task_details: Option<String>,
    pub next_to_do: Option<String>,
}
