//! Capabilities the host editor provides to the command flows.
//!
//! The core never renders anything. It reads and writes lines through a
//! `LineEditor`, reports through a `Notifier`, asks a `TaskPicker` which
//! fetched tasks to keep and hands the authorization URL to a `UrlOpener`.

use crate::tasks::FormattedTask;

/// The document being edited, positioned at the user's cursor.
pub trait LineEditor {
    /// Text of the line under the cursor.
    fn cursor_line(&self) -> String;
    /// Replace the line under the cursor.
    fn set_cursor_line(&mut self, text: &str);
    /// Replace the current selection (or insert at the cursor).
    fn replace_selection(&mut self, text: &str);
}

/// Short user-facing messages.
pub trait Notifier {
    fn notice(&self, message: &str);
}

/// Interactive selection of fetched tasks.
pub trait TaskPicker {
    /// Return one flag per task, `true` to import it, or `None` if the user
    /// dismissed the picker. Missing trailing flags count as `false`.
    fn pick(&mut self, tasks: &[FormattedTask]) -> Option<Vec<bool>>;
}

/// Opens a URL in the user's browser.
pub trait UrlOpener {
    fn open(&mut self, url: &str);
}

/// Keep the tasks whose flag is set.
pub fn apply_selection(tasks: Vec<FormattedTask>, selected: &[bool]) -> Vec<FormattedTask> {
    tasks
        .into_iter()
        .zip(selected.iter().copied().chain(std::iter::repeat(false)))
        .filter_map(|(task, keep)| keep.then_some(task))
        .collect()
}
