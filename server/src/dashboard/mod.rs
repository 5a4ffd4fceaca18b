use crate::task::{Task, TaskStatus};

pub mod web;

/// One month bucket of the creation histogram.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

/// Aggregate figures derived from one user's full task collection.
#[derive(Debug, PartialEq, Clone, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub by_month: Vec<MonthCount>,
}

impl TaskStats {
    /// Derives the dashboard figures from an already-fetched collection.
    /// Month buckets are keyed by the creation month's short calendar name
    /// and kept in first-seen order.
    pub fn derive(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let todo = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Todo)
            .count();
        let in_progress = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::InProgress)
            .count();
        let completed = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Completed)
            .count();

        let mut by_month: Vec<MonthCount> = Vec::new();
        for task in tasks {
            let label = task.created_at().format("%b").to_string();
            match by_month.iter_mut().find(|bucket| bucket.month == label) {
                Some(bucket) => bucket.count += 1,
                None => by_month.push(MonthCount {
                    month: label,
                    count: 1,
                }),
            }
        }

        Self {
            total,
            todo,
            in_progress,
            completed,
            by_month,
        }
    }

    /// Largest month bucket, used to scale the bar chart.
    pub fn max_month_count(&self) -> usize {
        self.by_month
            .iter()
            .map(|bucket| bucket.count)
            .max()
            .unwrap_or(0)
    }
}
