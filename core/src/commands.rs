//! User-facing command flows.
//!
//! # Design
//! `Bridge` wires the client, the session and the host capabilities into
//! the editor commands: import tasks, add the cursor line, complete the
//! cursor line, and the two-step authorization. Every flow either finishes
//! and writes to the document once, or notifies and writes nothing.

use tracing::{info, warn};

use crate::client::RtmClient;
use crate::config::{ConfigError, Endpoints, SettingsStore};
use crate::error::RtmError;
use crate::host::{apply_selection, LineEditor, Notifier, TaskPicker, UrlOpener};
use crate::http::Transport;
use crate::markdown::{decode_line, encode_block, encode_new_task, extract_task_name, mark_complete};
use crate::session::Session;
use crate::tasks::FormattedTask;

pub const DEFAULT_FILTER: &str = "status:incomplete";

/// What a command did to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A block of this many lines replaced the selection.
    Inserted(usize),
    /// The cursor line was rewritten.
    LineReplaced,
    /// The command stopped without touching the document.
    Aborted,
}

pub struct Bridge<T, S, N> {
    client: RtmClient,
    session: Session,
    transport: T,
    store: S,
    notifier: N,
}

impl<T, S, N> Bridge<T, S, N>
where
    T: Transport,
    S: SettingsStore,
    N: Notifier,
{
    /// Load settings from `store` and build a bridge against `endpoints`.
    pub fn new(transport: T, store: S, notifier: N, endpoints: Endpoints) -> Result<Self, ConfigError> {
        let settings = store.load()?;
        Ok(Self {
            client: RtmClient::with_endpoints(settings, endpoints),
            session: Session::new(),
            transport,
            store,
            notifier,
        })
    }

    pub fn client(&self) -> &RtmClient {
        &self.client
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Store new application keys, as entered in the host's settings panel.
    pub fn set_app_keys(&mut self, api_key: &str, shared_secret: &str) -> Result<(), ConfigError> {
        let mut settings = self.client.settings().clone();
        settings.api_key = api_key.to_string();
        settings.shared_secret = shared_secret.to_string();
        self.store.save(&settings)?;
        self.client.set_settings(settings);
        Ok(())
    }

    /// Notify and return `false` unless keys and token are configured.
    pub fn check_auth(&self) -> bool {
        let settings = self.client.settings();
        if !settings.has_app_keys() {
            self.notifier.notice("Please set your API Key and Secret in settings.");
            return false;
        }
        if settings.auth_token.is_empty() {
            self.notifier.notice("Please authenticate with RTM from settings.");
            return false;
        }
        true
    }

    /// Fetch tasks matching `filter` without touching the document.
    pub fn fetch_tasks(&self, filter: &str) -> Result<Vec<FormattedTask>, RtmError> {
        self.client.fetch_tasks(&self.transport, filter)
    }

    /// Insert every task matching `filter` at the selection.
    pub fn import_all<E: LineEditor>(&mut self, editor: &mut E, filter: &str) -> Outcome {
        match self.fetch_for_import(filter) {
            Some(tasks) => self.insert_tasks(editor, &tasks),
            None => Outcome::Aborted,
        }
    }

    /// Fetch tasks matching `filter`, let the user pick, insert the picked.
    pub fn import_selected<E, P>(&mut self, editor: &mut E, picker: &mut P, filter: &str) -> Outcome
    where
        E: LineEditor,
        P: TaskPicker,
    {
        let Some(tasks) = self.fetch_for_import(filter) else {
            return Outcome::Aborted;
        };
        let Some(selected) = picker.pick(&tasks) else {
            return Outcome::Aborted;
        };
        let picked = apply_selection(tasks, &selected);
        self.insert_tasks(editor, &picked)
    }

    /// Create a remote task from the cursor line and tag the line with its id.
    pub fn add_line<E: LineEditor>(&mut self, editor: &mut E) -> Outcome {
        if !self.check_auth() {
            return Outcome::Aborted;
        }
        let name = extract_task_name(&editor.cursor_line());
        if name.is_empty() {
            self.notifier.notice("Task name is empty.");
            return Outcome::Aborted;
        }
        self.notifier.notice(&format!("Adding: {name}"));

        let result = self
            .session
            .get_or_create_timeline(&self.client, &self.transport)
            .and_then(|timeline| self.client.add_task(&self.transport, &timeline, &name));
        match result {
            Ok(rtm_id) => {
                editor.set_cursor_line(&encode_new_task(&name, &rtm_id));
                self.notifier.notice("Added to RTM!");
                Outcome::LineReplaced
            }
            Err(e) => {
                warn!(error = %e, "add task failed");
                self.notifier.notice("Add error.");
                Outcome::Aborted
            }
        }
    }

    /// Complete the remote task tagged on the cursor line and check it off.
    pub fn complete_line<E: LineEditor>(&mut self, editor: &mut E) -> Outcome {
        if !self.check_auth() {
            return Outcome::Aborted;
        }
        let line = editor.cursor_line();
        let Some(rtm_id) = decode_line(&line) else {
            self.notifier.notice("Error: No RTM Link found.");
            return Outcome::Aborted;
        };
        if !rtm_id.is_addressable() {
            self.notifier.notice("Error: List ID invalid.");
            return Outcome::Aborted;
        }
        self.notifier.notice("Completing task...");

        let result = self
            .session
            .get_or_create_timeline(&self.client, &self.transport)
            .and_then(|timeline| self.client.complete_task(&self.transport, &timeline, &rtm_id));
        match result {
            Ok(()) => {
                editor.set_cursor_line(&mark_complete(&line));
                self.notifier.notice("Task completed!");
                Outcome::LineReplaced
            }
            Err(e) => {
                warn!(error = %e, "complete task failed");
                self.notifier.notice("Completion error.");
                Outcome::Aborted
            }
        }
    }

    /// Request a frob and open the authorization page for it. Returns the
    /// frob to pass to `finish_auth` once the user has granted access.
    pub fn begin_auth<O: UrlOpener>(&mut self, opener: &mut O) -> Option<String> {
        if !self.client.settings().has_app_keys() {
            self.notifier.notice("Enter keys first");
            return None;
        }
        let result = self
            .client
            .get_frob(&self.transport)
            .and_then(|frob| Ok((self.client.auth_url(&frob)?, frob)));
        match result {
            Ok((url, frob)) => {
                opener.open(&url);
                Some(frob)
            }
            Err(e) => {
                warn!(error = %e, "auth start failed");
                self.notifier.notice("Auth error.");
                None
            }
        }
    }

    /// Exchange an authorized frob for a token and persist it.
    ///
    /// A refusal from the service notifies "Failed."; a request that never
    /// got an answer, or a token that could not be saved, notifies "Error.".
    pub fn finish_auth(&mut self, frob: &str) -> bool {
        let token = match self.client.get_token(&self.transport, frob) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token exchange failed");
                let notice = match e {
                    RtmError::RemoteApi { .. } | RtmError::MalformedResponse(_) => "Failed.",
                    RtmError::MissingCredentials(_) | RtmError::Transport(_) => "Error.",
                };
                self.notifier.notice(notice);
                return false;
            }
        };
        let mut settings = self.client.settings().clone();
        settings.auth_token = token;
        if let Err(e) = self.store.save(&settings) {
            warn!(error = %e, "could not persist auth token");
            self.notifier.notice("Error.");
            return false;
        }
        self.client.set_settings(settings);
        self.session.reset();
        info!("authenticated");
        self.notifier.notice("Success!");
        true
    }

    fn fetch_for_import(&self, filter: &str) -> Option<Vec<FormattedTask>> {
        if !self.check_auth() {
            return None;
        }
        self.notifier.notice("Fetching tasks...");
        match self.fetch_tasks(filter) {
            Ok(tasks) if tasks.is_empty() => {
                self.notifier.notice("No tasks found.");
                None
            }
            Ok(tasks) => Some(tasks),
            Err(e) => {
                warn!(error = %e, filter, "fetch failed");
                self.notifier.notice("Fetch error.");
                None
            }
        }
    }

    fn insert_tasks<E: LineEditor>(&self, editor: &mut E, tasks: &[FormattedTask]) -> Outcome {
        if tasks.is_empty() {
            self.notifier.notice("No tasks selected.");
            return Outcome::Aborted;
        }
        editor.replace_selection(&encode_block(tasks));
        self.notifier.notice(&format!("{} tasks inserted.", tasks.len()));
        Outcome::Inserted(tasks.len())
    }
}
