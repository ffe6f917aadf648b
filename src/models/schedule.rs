use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::task::TaskPriority;

/// One position in a generated schedule. Lives for a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub task_id: String,
    pub title: String,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_duration: String,
    pub suggested_time_slot: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub schedule: Vec<ScheduleEntry>,
    pub total_tasks: usize,
    pub generated_at: DateTime<Utc>,
    pub source: ScheduleSource,
}

/// One item of the external service's schedule array, as loosely as the
/// service sends it. Every field is optional and blank strings count as
/// missing; defaults are applied during reconciliation.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalScheduleItem {
    #[serde(deserialize_with = "non_blank")]
    pub task_title: Option<String>,
    #[serde(deserialize_with = "non_blank")]
    pub priority: Option<String>,
    #[serde(deserialize_with = "non_blank")]
    pub suggested_time_slot: Option<String>,
    #[serde(deserialize_with = "non_blank")]
    pub estimated_duration: Option<String>,
    #[serde(deserialize_with = "non_blank")]
    pub reasoning: Option<String>,
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let text = match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    };
    Ok(text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    #[serde(default)]
    pub task_id: String,
}
