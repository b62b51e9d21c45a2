//! Markdown line codec.
//!
//! A tracked task is one checklist line carrying an id tag,
//! `[🐮](rtm:LIST:SERIES:TASK)`, right after the checkbox. The tag is the
//! only link between document text and the remote record. Every function
//! here is total over arbitrary input.

use once_cell::sync::Lazy;

use regex::Regex;

use crate::tasks::{FormattedTask, TaskRef};

pub const ID_GLYPH: &str = "🐮";
pub const INCOMPLETE_MARKER: &str = "- [ ]";
pub const COMPLETE_MARKER: &str = "- [x]";

static ID_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(rtm:([A-Za-z0-9_]+):([A-Za-z0-9_]+):([A-Za-z0-9_]+)\)").unwrap()
});
static LIST_SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,.]+").unwrap());
static CHECKBOX_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*] \[[ x]\] ").unwrap());
static BULLET_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*] ").unwrap());

/// `[🐮](rtm:list:series:task)`
pub fn id_tag(rtm_id: &TaskRef) -> String {
    format!(
        "[{ID_GLYPH}](rtm:{}:{}:{})",
        rtm_id.list_id, rtm_id.series_id, rtm_id.task_id
    )
}

/// Hashtag for a list name, with runs of whitespace, commas and periods
/// collapsed to `_`. Empty names produce no tag.
pub fn list_tag(list_name: &str) -> String {
    if list_name.is_empty() {
        return String::new();
    }
    format!(" #{}", LIST_SLUG_RE.replace_all(list_name, "_"))
}

/// Render one task as an unchecked checklist line, without a line break.
pub fn encode_line(task: &FormattedTask) -> String {
    let tags: String = task.tags.iter().map(|tag| format!(" #{tag}")).collect();
    format!(
        "{INCOMPLETE_MARKER} {} {}{}{}{}{}",
        id_tag(&task.rtm_id),
        task.name,
        task.priority,
        task.due,
        list_tag(&task.list_name),
        tags
    )
}

/// Render tasks as a block of lines, each terminated by `\n`.
pub fn encode_block(tasks: &[FormattedTask]) -> String {
    tasks
        .iter()
        .map(|task| encode_line(task) + "\n")
        .collect()
}

/// Line written back after a task is created from free text.
pub fn encode_new_task(name: &str, rtm_id: &TaskRef) -> String {
    format!("{INCOMPLETE_MARKER} {} {name}", id_tag(rtm_id))
}

/// Extract the id tag from the first `(rtm:…:…:…)` in `line`.
///
/// `None` means the line is not a tracked remote task.
pub fn decode_line(line: &str) -> Option<TaskRef> {
    let caps = ID_TAG_RE.captures(line)?;
    Some(TaskRef::new(&caps[1], &caps[2], &caps[3]))
}

/// Recover free-form task text from a checklist or bullet line.
pub fn extract_task_name(line: &str) -> String {
    let without_checkbox = CHECKBOX_PREFIX_RE.replace(line, "");
    let without_bullet = BULLET_PREFIX_RE.replace(&without_checkbox, "");
    without_bullet.trim().to_string()
}

/// Replace the first unchecked marker with a checked one. Lines without the
/// marker come back unchanged.
pub fn mark_complete(line: &str) -> String {
    line.replacen(INCOMPLETE_MARKER, COMPLETE_MARKER, 1)
}
