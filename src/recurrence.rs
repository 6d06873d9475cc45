//! Recurrence of compliance tasks.
//!
//! When a recurring revenue task's period closes, the next period's task is
//! derived from it here. Generation is pure; inserting the result and marking
//! the template as rolled over is the task store's job.

use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::compliance::{advance_years, format_years, parse_years, period_end};
use crate::error::{FirmError, Result};
use crate::fields::ComplianceFrequency;
use crate::task::{Compliance, NewTask, RevenueDetails, Task};

/// How generated tasks are scheduled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrencePolicy {
    /// Days before the new period's end date that the task falls due.
    #[serde(default)]
    pub lead_days: u32,
}

/// Build the task for the compliance period following `task`'s.
///
/// Fails when the task is not a recurring revenue task or its period cannot be
/// determined. One-time obligations never recur.
pub fn generate_next_recurrence(task: &Task, initial_status_id: u64, policy: &RecurrencePolicy) -> Result<NewTask> {
    let revenue = task
        .revenue
        .as_ref()
        .ok_or_else(|| FirmError::recurrence(task.id, "administrative tasks do not recur"))?;
    let compliance = revenue
        .compliance
        .as_ref()
        .ok_or_else(|| FirmError::recurrence(task.id, "task has no compliance period"))?;
    if !compliance.is_recurring {
        return Err(FirmError::recurrence(task.id, "task is not recurring"));
    }
    let frequency = compliance
        .frequency
        .ok_or_else(|| FirmError::recurrence(task.id, "compliance frequency is missing or unrecognised"))?;
    if frequency == ComplianceFrequency::OneTime {
        return Err(FirmError::recurrence(task.id, "one-time obligations do not recur"));
    }

    let previous_end = match (compliance.end_date, compliance.start_date) {
        (Some(end), _) => end,
        (None, Some(start)) => period_end(frequency, start)
            .ok_or_else(|| FirmError::recurrence(task.id, "compliance period is out of range"))?,
        (None, None) => return Err(FirmError::recurrence(task.id, "compliance period has no dates")),
    };

    let next_start = previous_end
        .date()
        .succ_opt()
        .ok_or_else(|| FirmError::recurrence(task.id, "compliance period is out of range"))?;
    let next_end = period_end(frequency, next_start)
        .ok_or_else(|| FirmError::recurrence(task.id, "compliance period is out of range"))?;

    let year = match compliance.year.as_deref().filter(|y| !y.trim().is_empty()) {
        Some(y) => {
            let years = parse_years(y).map_err(|e| FirmError::recurrence(task.id, e.to_string()))?;
            Some(format_years(&advance_years(frequency, &years, next_start)))
        }
        None => None,
    };

    let due_date = next_end
        .date()
        .checked_sub_days(Days::new(policy.lead_days.into()))
        .map_or(next_start, |d| d.max(next_start));

    Ok(NewTask {
        task_type: task.task_type,
        assignee_id: task.assignee_id,
        status_id: initial_status_id,
        due_date,
        task_details: task.task_details.clone(),
        next_to_do: None,
        revenue: Some(RevenueDetails {
            client_id: revenue.client_id,
            entity_id: revenue.entity_id,
            service_type_id: revenue.service_type_id,
            task_category_id: revenue.task_category_id,
            compliance: Some(Compliance {
                frequency: Some(frequency),
                year,
                start_date: Some(next_start),
                end_date: Some(next_end),
                is_recurring: true,
                rolled_over: false,
            }),
            invoice: revenue.invoice.clone(),
            recurred_from: Some(task.id),
        }),
    })
}

/// Whether a task's compliance period has ended as of `now`.
pub fn period_has_ended(task: &Task, now: NaiveDateTime) -> bool {
    task.compliance()
        .and_then(|c| match (c.end_date, c.start_date, c.frequency) {
            (Some(end), _, _) => Some(end),
            (None, Some(start), Some(f)) => period_end(f, start),
            _ => None,
        })
        .is_some_and(|end| end < now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::TaskType;
    use crate::task::Invoice;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn eod(y: i32, m: u32, day: u32) -> NaiveDateTime {
        d(y, m, day).and_hms_milli_opt(23, 59, 59, 999).unwrap()
    }

    fn recurring(frequency: ComplianceFrequency, year: &str, start: NaiveDate, end: NaiveDateTime) -> Task {
        Task {
            id: 42,
            task_type: TaskType::Medium,
            assignee_id: Some(3),
            status_id: 9,
            due_date: end.date(),
            task_details: "Lodge annual return".into(),
            next_to_do: Some("Chase bank statements".into()),
            revenue: Some(RevenueDetails {
                client_id: 1,
                entity_id: 2,
                service_type_id: 4,
                task_category_id: Some(5),
                compliance: Some(Compliance {
                    frequency: Some(frequency),
                    year: Some(year.into()),
                    start_date: Some(start),
                    end_date: Some(end),
                    is_recurring: true,
                    rolled_over: false,
                }),
                invoice: Some(Invoice { currency: "AUD".into(), service_rate: 450.0 }),
                recurred_from: None,
            }),
            created_at_utc: 0,
            updated_at_utc: 0,
        }
    }

    #[test]
    fn test_annual_rolls_into_next_calendar_year() {
        let task = recurring(ComplianceFrequency::Annual, "2024", d(2024, 1, 1), eod(2024, 12, 31));
        let next = generate_next_recurrence(&task, 1, &RecurrencePolicy::default()).unwrap();
        let revenue = next.revenue.as_ref().unwrap();
        let c = revenue.compliance.as_ref().unwrap();
        assert_eq!(c.start_date, Some(d(2025, 1, 1)));
        assert_eq!(c.end_date, Some(eod(2025, 12, 31)));
        assert_eq!(c.year.as_deref(), Some("2025"));
        assert!(c.is_recurring);
        assert!(!c.rolled_over);
        assert_eq!(revenue.recurred_from, Some(42));
        assert_eq!(next.status_id, 1);
        assert_eq!(next.due_date, d(2025, 12, 31));
    }

    #[test]
    fn test_template_fields_are_carried_over() {
        let task = recurring(ComplianceFrequency::Quarterly, "2024", d(2024, 1, 1), eod(2024, 4, 30));
        let next = generate_next_recurrence(&task, 1, &RecurrencePolicy::default()).unwrap();
        let revenue = next.revenue.unwrap();
        assert_eq!(next.assignee_id, Some(3));
        assert_eq!(next.task_details, "Lodge annual return");
        assert_eq!(next.next_to_do, None);
        assert_eq!((revenue.client_id, revenue.entity_id, revenue.service_type_id), (1, 2, 4));
        assert_eq!(revenue.task_category_id, Some(5));
        assert_eq!(revenue.invoice, Some(Invoice { currency: "AUD".into(), service_rate: 450.0 }));
        let c = revenue.compliance.unwrap();
        assert_eq!(c.start_date, Some(d(2024, 5, 1)));
        assert_eq!(c.end_date, Some(eod(2024, 8, 31)));
    }

    #[test]
    fn test_multi_year_list_advances_by_span() {
        let task = recurring(ComplianceFrequency::ThreeYears, "2022,2023,2024", d(2022, 1, 1), eod(2024, 12, 31));
        let next = generate_next_recurrence(&task, 1, &RecurrencePolicy::default()).unwrap();
        let c = next.revenue.unwrap().compliance.unwrap();
        assert_eq!(c.year.as_deref(), Some("2025,2026,2027"));
        assert_eq!(c.end_date, Some(eod(2027, 12, 31)));
    }

    #[test]
    fn test_lead_days_pull_due_date_forward() {
        let task = recurring(ComplianceFrequency::Monthly, "2024", d(2024, 1, 1), eod(2024, 1, 31));
        let next = generate_next_recurrence(&task, 1, &RecurrencePolicy { lead_days: 10 }).unwrap();
        assert_eq!(next.due_date, d(2024, 2, 19));
        let next = generate_next_recurrence(&task, 1, &RecurrencePolicy { lead_days: 90 }).unwrap();
        assert_eq!(next.due_date, d(2024, 2, 1));
    }

    #[test]
    fn test_huge_lead_time_clamps_to_period_start() {
        let task = recurring(ComplianceFrequency::Annual, "2024", d(2024, 1, 1), eod(2024, 12, 31));
        let next = generate_next_recurrence(&task, 1, &RecurrencePolicy { lead_days: u32::MAX }).unwrap();
        assert_eq!(next.due_date, d(2025, 1, 1));
    }

    #[test]
    fn test_non_recurring_and_one_time_are_errors() {
        let mut task = recurring(ComplianceFrequency::Annual, "2024", d(2024, 1, 1), eod(2024, 12, 31));
        if let Some(c) = task.revenue.as_mut().and_then(|r| r.compliance.as_mut()) {
            c.is_recurring = false;
        }
        assert!(matches!(
            generate_next_recurrence(&task, 1, &RecurrencePolicy::default()),
            Err(FirmError::Recurrence { task_id: 42, .. })
        ));

        let once = recurring(ComplianceFrequency::OneTime, "2024", d(2024, 3, 1), eod(2024, 3, 1));
        assert!(generate_next_recurrence(&once, 1, &RecurrencePolicy::default()).is_err());

        let mut no_freq = recurring(ComplianceFrequency::Annual, "2024", d(2024, 1, 1), eod(2024, 12, 31));
        if let Some(c) = no_freq.revenue.as_mut().and_then(|r| r.compliance.as_mut()) {
            c.frequency = None;
        }
        assert!(generate_next_recurrence(&no_freq, 1, &RecurrencePolicy::default()).is_err());
    }

    #[test]
    fn test_period_has_ended() {
        let task = recurring(ComplianceFrequency::Annual, "2024", d(2024, 1, 1), eod(2024, 12, 31));
        assert!(!period_has_ended(&task, eod(2024, 12, 30)));
        assert!(period_has_ended(&task, d(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap()));
    }
}
