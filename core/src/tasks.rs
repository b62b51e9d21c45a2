//! Canonical task model built from `rtm.tasks.getList` responses.
//!
//! # Design
//! A `FormattedTask` is produced once per task series and never mutated.
//! Display fragments (`due`, `priority`) are rendered here, with their
//! leading space, so the line codec only concatenates. The raw values are
//! kept alongside for callers that need them.
//!
//! A series may carry several occurrences; the first one drives the
//! displayed due date and priority.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RtmError;
use crate::normalize::{non_empty_field, normalize_to_array, string_field, ListMap};

/// List id used when neither the containing list nor the series names one.
pub const MISSING_LIST_ID: &str = "MISSING";

pub const DUE_GLYPH: &str = "📅";
pub const HIGH_PRIORITY_GLYPH: &str = "🔺";
pub const MEDIUM_PRIORITY_GLYPH: &str = "🔼";
pub const LOW_PRIORITY_GLYPH: &str = "🔽";

/// The three-part address of one task occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub list_id: String,
    pub series_id: String,
    pub task_id: String,
}

impl TaskRef {
    pub fn new(
        list_id: impl Into<String>,
        series_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            list_id: list_id.into(),
            series_id: series_id.into(),
            task_id: task_id.into(),
        }
    }

    /// Mutating calls need a real list id; the `MISSING` sentinel only
    /// round-trips through text.
    pub fn is_addressable(&self) -> bool {
        !self.list_id.is_empty() && self.list_id != MISSING_LIST_ID
    }
}

/// A remote task ready to be rendered as a markdown line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedTask {
    pub name: String,
    pub due: String,
    pub priority: String,
    pub list_name: String,
    pub tags: Vec<String>,
    pub rtm_id: TaskRef,
    pub raw_priority: String,
    pub raw_due: String,
}

/// ` 📅 YYYY-MM-DD` for a non-empty raw due timestamp, else empty.
pub fn due_display(raw_due: &str) -> String {
    if raw_due.is_empty() {
        return String::new();
    }
    let date = raw_due.split('T').next().unwrap_or(raw_due);
    format!(" {DUE_GLYPH} {date}")
}

/// Glyph fragment for the service's priority codes `1`, `2` and `3`.
/// Everything else, including `N` (no priority), renders as empty.
pub fn priority_display(raw_priority: &str) -> String {
    let glyph = match raw_priority {
        "1" => HIGH_PRIORITY_GLYPH,
        "2" => MEDIUM_PRIORITY_GLYPH,
        "3" => LOW_PRIORITY_GLYPH,
        _ => return String::new(),
    };
    format!(" {glyph}")
}

/// Build tasks from a `rtm.tasks.getList` envelope, in response order.
///
/// An envelope without a `tasks` collection means no task matched the
/// filter and yields an empty vector. A series that cannot be addressed
/// (no series id, no occurrence, or an occurrence without id) is skipped.
pub fn build_tasks(envelope: &Value, list_map: &ListMap) -> Result<Vec<FormattedTask>, RtmError> {
    let rsp = envelope
        .get("rsp")
        .ok_or_else(|| RtmError::malformed("envelope has no rsp object"))?;
    let Some(tasks) = rsp.get("tasks") else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for list in normalize_to_array(tasks.get("list")) {
        let list_id = non_empty_field(list, "id");
        for series in normalize_to_array(list.get("taskseries")) {
            match build_task(series, list_id.as_deref(), list_map) {
                Ok(task) => out.push(task),
                Err(e) => debug!(error = %e, "skipping task series"),
            }
        }
    }
    Ok(out)
}

fn build_task(
    series: &Value,
    list_id: Option<&str>,
    list_map: &ListMap,
) -> Result<FormattedTask, RtmError> {
    let series_id = non_empty_field(series, "id")
        .ok_or_else(|| RtmError::malformed("task series without id"))?;
    let occurrence = normalize_to_array(series.get("task"))
        .into_iter()
        .next()
        .ok_or_else(|| RtmError::malformed(format!("task series {series_id} has no task")))?;
    let task_id = non_empty_field(occurrence, "id")
        .ok_or_else(|| RtmError::malformed(format!("task in series {series_id} has no id")))?;

    let resolved_list = list_id
        .map(str::to_string)
        .or_else(|| non_empty_field(series, "list_id"))
        .unwrap_or_else(|| MISSING_LIST_ID.to_string());

    let raw_due = string_field(occurrence, "due").unwrap_or_default();
    let raw_priority = string_field(occurrence, "priority").unwrap_or_default();

    let tags = normalize_to_array(series.get("tags").and_then(|t| t.get("tag")))
        .into_iter()
        .filter_map(|tag| tag.as_str().map(str::to_string))
        .collect();

    Ok(FormattedTask {
        name: string_field(series, "name").unwrap_or_default(),
        due: due_display(&raw_due),
        priority: priority_display(&raw_priority),
        list_name: list_map.get(&resolved_list).cloned().unwrap_or_default(),
        tags,
        rtm_id: TaskRef::new(resolved_list, series_id, task_id),
        raw_priority,
        raw_due,
    })
}

/// Address of the task returned by `rtm.tasks.add` (or any transaction
/// response carrying `rsp.list`): first list, first series, first task.
pub fn first_task_ref(envelope: &Value) -> Result<TaskRef, RtmError> {
    let list = normalize_to_array(envelope.pointer("/rsp/list"))
        .into_iter()
        .next()
        .ok_or_else(|| RtmError::malformed("response has no list"))?;
    let list_id =
        non_empty_field(list, "id").ok_or_else(|| RtmError::malformed("list without id"))?;
    let series = normalize_to_array(list.get("taskseries"))
        .into_iter()
        .next()
        .ok_or_else(|| RtmError::malformed("list has no task series"))?;
    let series_id = non_empty_field(series, "id")
        .ok_or_else(|| RtmError::malformed("task series without id"))?;
    let task = normalize_to_array(series.get("task"))
        .into_iter()
        .next()
        .ok_or_else(|| RtmError::malformed("task series has no task"))?;
    let task_id = non_empty_field(task, "id").ok_or_else(|| RtmError::malformed("task without id"))?;

    Ok(TaskRef::new(list_id, series_id, task_id))
}
