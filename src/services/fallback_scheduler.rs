//! Deterministic ordering used whenever the generation service cannot be
//! trusted. Pure and total: every input task yields exactly one entry.

use std::cmp::Ordering;

use crate::models::schedule::ScheduleEntry;
use crate::models::task::{TaskPriority, TaskRecord};

pub const DEFAULT_DURATION: &str = "2 hours";

const FIRST_SLOT_HOUR: usize = 9;
const SLOT_HOURS: usize = 2;

/// Orders `tasks` by priority (High first), then by deadline with dated
/// tasks ahead of undated ones, and assigns back-to-back two hour slots
/// starting at 9:00. Ties keep their input order.
pub fn fallback_schedule(tasks: &[TaskRecord]) -> Vec<ScheduleEntry> {
    let mut ordered: Vec<&TaskRecord> = tasks.iter().collect();
    // `sort_by` is stable, which the undated tie rule relies on.
    ordered.sort_by(|a, b| compare_tasks(a, b));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, task)| ScheduleEntry {
            task_id: task.id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            deadline: task.deadline,
            estimated_duration: DEFAULT_DURATION.to_string(),
            suggested_time_slot: time_slot(index),
            reasoning: fallback_reasoning(task.priority),
        })
        .collect()
}

pub fn compare_tasks(a: &TaskRecord, b: &TaskRecord) -> Ordering {
    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| match (a.deadline, b.deadline) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// `"{9+2i}:00 - {11+2i}:00"` for zero-based position `i`.
pub fn time_slot(index: usize) -> String {
    let start = FIRST_SLOT_HOUR + SLOT_HOURS * index;
    format!("{}:00 - {}:00", start, start + SLOT_HOURS)
}

fn fallback_reasoning(priority: TaskPriority) -> String {
    format!("{priority} priority task scheduled based on deadline and importance.")
}
