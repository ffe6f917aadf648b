use crate::models::task::TaskRecord;

/// Prompt asking for a JSON array schedule over the given incomplete tasks.
/// Only titles, priorities and deadlines are sent; ids stay local.
pub fn build_schedule_prompt(tasks: &[TaskRecord]) -> String {
    let tasks_context = tasks
        .iter()
        .map(|task| {
            let deadline = task
                .deadline
                .map(|value| value.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "No deadline".to_string());
            format!(
                "- \"{}\" (Priority: {}, Deadline: {})",
                task.title, task.priority, deadline
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a productivity expert AI. Analyze these tasks and create an optimized daily schedule.

Tasks to schedule:
{tasks_context}

Create scheduling recommendations that:
1. Prioritize high-priority tasks during peak productivity hours (9-11 AM)
2. Consider deadlines and urgency
3. Suggest realistic time blocks (1-3 hours per task)
4. Include brief reasoning for each scheduling decision
5. Optimize for productivity flow and energy management

IMPORTANT: Respond ONLY with a valid JSON array. No additional text or explanation outside the JSON.

Format each schedule item exactly like this:
[
  {{
    "taskTitle": "Task name here",
    "priority": "High|Medium|Low",
    "suggestedTimeSlot": "9:00 - 11:00",
    "estimatedDuration": "2 hours",
    "reasoning": "Brief explanation for timing choice"
  }}
]

Keep reasoning concise (1-2 sentences) and focus on productivity optimization."#
    )
}

pub fn build_suggestion_prompt(task: &TaskRecord) -> String {
    let mut prompt = format!(
        "You are a productivity assistant. Analyze this task and provide a helpful suggestion for completing it efficiently:\n\nTask: {}",
        task.title
    );

    if let Some(description) = &task.description {
        prompt.push_str(&format!("\nDescription: {description}"));
    }
    prompt.push_str(&format!("\nPriority: {}", task.priority));
    if let Some(deadline) = task.deadline {
        prompt.push_str(&format!("\nDeadline: {}", deadline.format("%Y-%m-%d")));
    }

    prompt.push_str(
        "\n\nProvide a concise, actionable suggestion (1-2 sentences) that helps the user complete this task more effectively. Focus on time management, task breakdown, or productivity tips.",
    );
    prompt
}
