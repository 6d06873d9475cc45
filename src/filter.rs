//! Task list filtering and metrics.
//!
//! A `FilterState` value describes everything a task list can be narrowed by.
//! `TaskQuery` applies it to a task collection as a lazy view that can be
//! iterated any number of times, and derives the bucket counts shown above the
//! list. Nothing is cached: a new filter state means a new query.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::directory::Directory;
use crate::fields::*;
use crate::task::{Task, TaskStatus};
use crate::workflow::completed_status;

/// Field constraints from the advanced filter panel. `None` means no constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvancedFilters {
    pub status_id: Option<u64>,
    pub assignee_id: Option<u64>,
    pub client_id: Option<u64>,
    pub task_type: Option<TaskType>,
}

impl AdvancedFilters {
    pub fn matches(&self, task: &Task) -> bool {
        self.status_id.map_or(true, |s| task.status_id == s)
            && self.assignee_id.map_or(true, |a| task.assignee_id == Some(a))
            && self.client_id.map_or(true, |c| task.client_id() == Some(c))
            && self.task_type.map_or(true, |t| task.task_type == t)
    }
}

/// Complete, serializable filter state of a task list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterState {
    #[serde(default)]
    pub quick: QuickFilter,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub advanced: AdvancedFilters,
}

/// Bucket counts over a task collection.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Metrics {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub high_priority: usize,
    pub my_tasks: usize,
}

pub struct TaskQuery<'a> {
    tasks: &'a [Task],
    directory: &'a dyn Directory,
    completed_status_id: Option<u64>,
    current_user_id: Option<u64>,
    today: NaiveDate,
    state: FilterState,
    search: String,
}

impl<'a> TaskQuery<'a> {
    pub fn new(
        tasks: &'a [Task],
        statuses: &[TaskStatus],
        directory: &'a dyn Directory,
        current_user_id: Option<u64>,
        state: FilterState,
        now: NaiveDateTime,
    ) -> Self {
        let search = state.search.trim().to_lowercase();
        TaskQuery {
            tasks,
            directory,
            completed_status_id: completed_status(statuses).map(|s| s.id),
            current_user_id,
            today: now.date(),
            state,
            search,
        }
    }

    pub fn is_completed(&self, task: &Task) -> bool {
        self.completed_status_id == Some(task.status_id)
    }

    /// Due before today and not completed.
    pub fn is_overdue(&self, task: &Task) -> bool {
        task.due_date < self.today && !self.is_completed(task)
    }

    pub fn is_due_today(&self, task: &Task) -> bool {
        task.due_date == self.today
    }

    fn is_mine(&self, task: &Task) -> bool {
        self.current_user_id.is_some() && task.assignee_id == self.current_user_id
    }

    /// Quick filters select exactly the tasks their metric counts.
    pub fn matches_quick(&self, task: &Task, quick: QuickFilter) -> bool {
        match quick {
            QuickFilter::All => true,
            QuickFilter::My => self.is_mine(task) && !self.is_completed(task),
            QuickFilter::Overdue => self.is_overdue(task),
            QuickFilter::Today => self.is_due_today(task),
            QuickFilter::Completed => self.is_completed(task),
            QuickFilter::Pending => !self.is_completed(task),
            QuickFilter::High => task.task_type == TaskType::Urgent && !self.is_completed(task),
        }
    }

    /// Case-insensitive match on task details, client name or assignee name.
    pub fn matches_search(&self, task: &Task) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let hit = |text: &str| text.to_lowercase().contains(&self.search);
        hit(&task.task_details)
            || task.client_id().and_then(|c| self.directory.client_name(c)).is_some_and(hit)
            || task.assignee_id.and_then(|u| self.directory.user_name(u)).is_some_and(hit)
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.matches_quick(task, self.state.quick)
            && self.state.advanced.matches(task)
            && self.matches_search(task)
    }

    /// Visible tasks in collection order.
    pub fn visible(&self) -> impl Iterator<Item = &'a Task> + '_ {
        self.tasks.iter().filter(move |t| self.matches(t))
    }

    /// Counts over the whole collection, independent of the active filters.
    pub fn metrics(&self) -> Metrics {
        let mut m = Metrics { total: self.tasks.len(), ..Metrics::default() };
        for t in self.tasks {
            if self.is_completed(t) {
                m.completed += 1;
            } else {
                m.pending += 1;
            }
            if self.matches_quick(t, QuickFilter::Overdue) {
                m.overdue += 1;
            }
            if self.matches_quick(t, QuickFilter::Today) {
                m.due_today += 1;
            }
            if self.matches_quick(t, QuickFilter::High) {
                m.high_priority += 1;
            }
            if self.matches_quick(t, QuickFilter::My) {
                m.my_tasks += 1;
            }
        }
        m
    }
}

/// Visible subset and metrics for a task list in one call.
pub fn filter_tasks<'a>(
    tasks: &'a [Task],
    statuses: &[TaskStatus],
    directory: &'a dyn Directory,
    current_user_id: Option<u64>,
    state: FilterState,
    now: NaiveDateTime,
) -> (Vec<&'a Task>, Metrics) {
    let query = TaskQuery::new(tasks, statuses, directory, current_user_id, state, now);
    let visible = query.visible().collect();
    (visible, query.metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Directories;
    use crate::task::RevenueDetails;

    const DONE: u64 = 3;

    fn statuses() -> Vec<TaskStatus> {
        vec![
            TaskStatus { id: 1, name: "New".into(), rank: 1 },
            TaskStatus { id: 2, name: "In Progress".into(), rank: 2 },
            TaskStatus { id: DONE, name: "Completed".into(), rank: 3 },
        ]
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn task(id: u64, status_id: u64, due: (i32, u32, u32), assignee: u64) -> Task {
        Task {
            id,
            task_type: TaskType::Regular,
            assignee_id: Some(assignee),
            status_id,
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            task_details: format!("Task number {id}"),
            next_to_do: None,
            revenue: None,
            created_at_utc: 0,
            updated_at_utc: 0,
        }
    }

    fn directory() -> Directories {
        let mut dir = Directories::default();
        dir.add_user("Me Myself");
        dir.add_user("Priya Raman");
        dir.add_client("Harbour Bakery");
        dir
    }

    fn sample() -> Vec<Task> {
        vec![
            task(1, DONE, (2024, 6, 1), 2),
            task(2, DONE, (2024, 6, 20), 1),
            task(3, 1, (2024, 6, 10), 2),
            task(4, 2, (2024, 6, 15), 2),
            task(5, 1, (2024, 6, 30), 1),
        ]
    }

    #[test]
    fn test_metrics_scenario() {
        let tasks = sample();
        let dir = directory();
        let (_, m) = filter_tasks(&tasks, &statuses(), &dir, Some(1), FilterState::default(), now());
        assert_eq!(
            m,
            Metrics { total: 5, pending: 3, completed: 2, overdue: 1, due_today: 1, high_priority: 0, my_tasks: 1 }
        );
    }

    #[test]
    fn test_overdue_never_includes_future_or_completed() {
        let tasks = sample();
        let dir = directory();
        let state = FilterState { quick: QuickFilter::Overdue, ..Default::default() };
        let (visible, _) = filter_tasks(&tasks, &statuses(), &dir, Some(1), state, now());
        assert_eq!(visible.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3]);
        for t in visible {
            assert!(t.due_date < now().date());
            assert_ne!(t.status_id, DONE);
        }
    }

    #[test]
    fn test_each_quick_filter_agrees_with_its_metric() {
        let mut tasks = sample();
        tasks[4].task_type = TaskType::Urgent;
        tasks[0].task_type = TaskType::Urgent;
        let dir = directory();
        let st = statuses();
        let count = |quick| {
            let state = FilterState { quick, ..Default::default() };
            TaskQuery::new(&tasks, &st, &dir, Some(1), state, now()).visible().count()
        };
        let m = TaskQuery::new(&tasks, &st, &dir, Some(1), FilterState::default(), now()).metrics();
        assert_eq!(count(QuickFilter::All), m.total);
        assert_eq!(count(QuickFilter::My), m.my_tasks);
        assert_eq!(count(QuickFilter::Overdue), m.overdue);
        assert_eq!(count(QuickFilter::Today), m.due_today);
        assert_eq!(count(QuickFilter::Completed), m.completed);
        assert_eq!(count(QuickFilter::Pending), m.pending);
        assert_eq!(count(QuickFilter::High), m.high_priority);
        assert_eq!(m.high_priority, 1);
    }

    #[test]
    fn test_search_matches_details_client_and_assignee() {
        let mut tasks = sample();
        tasks[1].revenue = Some(RevenueDetails {
            client_id: 1,
            entity_id: 1,
            service_type_id: 1,
            task_category_id: None,
            compliance: None,
            invoice: None,
            recurred_from: None,
        });
        let dir = directory();
        let st = statuses();
        let ids = |search: &str| {
            let state = FilterState { search: search.into(), ..Default::default() };
            TaskQuery::new(&tasks, &st, &dir, Some(1), state, now()).visible().map(|t| t.id).collect::<Vec<_>>()
        };
        assert_eq!(ids("NUMBER 4"), vec![4]);
        assert_eq!(ids("bakery"), vec![2]);
        assert_eq!(ids("priya"), vec![1, 3, 4]);
        assert_eq!(ids("   "), vec![1, 2, 3, 4, 5]);
        assert!(ids("nothing like this").is_empty());
    }

    #[test]
    fn test_advanced_filters_combine_with_quick_filter() {
        let tasks = sample();
        let dir = directory();
        let st = statuses();
        let state = FilterState {
            quick: QuickFilter::Pending,
            advanced: AdvancedFilters { assignee_id: Some(2), ..Default::default() },
            ..Default::default()
        };
        let query = TaskQuery::new(&tasks, &st, &dir, Some(1), state, now());
        assert_eq!(query.visible().map(|t| t.id).collect::<Vec<_>>(), vec![3, 4]);
        // The view is restartable.
        assert_eq!(query.visible().count(), 2);

        let state = FilterState {
            advanced: AdvancedFilters { client_id: Some(1), ..Default::default() },
            ..Default::default()
        };
        let query = TaskQuery::new(&tasks, &st, &dir, Some(1), state, now());
        assert_eq!(query.visible().count(), 0);
    }

    #[test]
    fn test_no_current_user_means_no_my_tasks() {
        let tasks = sample();
        let dir = directory();
        let m = TaskQuery::new(&tasks, &statuses(), &dir, None, FilterState::default(), now()).metrics();
        assert_eq!(m.my_tasks, 0);
    }
}
