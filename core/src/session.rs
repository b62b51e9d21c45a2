//! Per-process session state.
//!
//! # Design
//! Mutating API methods need a timeline. One is requested lazily on first
//! use and reused for the rest of the session; it is never refreshed on its
//! own. The session is an explicit value handed to mutating operations
//! instead of a global, so its lifetime is visible to the caller.
//!
//! Two callers that both find the cache empty will each create a timeline
//! and the later one overwrites the cache. Any valid timeline works, so the
//! duplicate is harmless.

use tracing::debug;

use crate::client::RtmClient;
use crate::error::RtmError;
use crate::http::Transport;

#[derive(Debug, Clone, Default)]
pub struct Session {
    timeline: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached timeline, if one has been created.
    pub fn cached_timeline(&self) -> Option<&str> {
        self.timeline.as_deref()
    }

    /// Return the cached timeline or create one. A failed creation leaves
    /// the cache empty.
    pub fn get_or_create_timeline<T: Transport + ?Sized>(
        &mut self,
        client: &RtmClient,
        transport: &T,
    ) -> Result<String, RtmError> {
        if let Some(timeline) = &self.timeline {
            return Ok(timeline.clone());
        }
        let timeline = client.create_timeline(transport)?;
        debug!("created timeline");
        self.timeline = Some(timeline.clone());
        Ok(timeline)
    }

    /// Store a timeline obtained elsewhere, replacing any cached one.
    pub fn store_timeline(&mut self, timeline: impl Into<String>) {
        self.timeline = Some(timeline.into());
    }

    /// Forget the timeline, e.g. after the auth token changed.
    pub fn reset(&mut self) {
        self.timeline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoints, Settings};
    use crate::http::{HttpRequest, HttpResponse};
    use std::cell::Cell;

    struct TimelineServer {
        calls: Cell<usize>,
        fail: bool,
    }

    impl Transport for TimelineServer {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, RtmError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(RtmError::Transport("timed out".to_string()));
            }
            Ok(HttpResponse {
                status: 200,
                body: format!(r#"{{"rsp":{{"stat":"ok","timeline":"tl{}"}}}}"#, self.calls.get()),
            })
        }
    }

    fn client() -> RtmClient {
        RtmClient::with_endpoints(
            Settings {
                api_key: "k".to_string(),
                shared_secret: "s".to_string(),
                auth_token: "t".to_string(),
            },
            Endpoints::with_base("http://localhost"),
        )
    }

    #[test]
    fn timeline_is_created_once() {
        let server = TimelineServer {
            calls: Cell::new(0),
            fail: false,
        };
        let mut session = Session::new();
        assert_eq!(session.cached_timeline(), None);
        assert_eq!(session.get_or_create_timeline(&client(), &server).unwrap(), "tl1");
        assert_eq!(session.get_or_create_timeline(&client(), &server).unwrap(), "tl1");
        assert_eq!(server.calls.get(), 1);
        assert_eq!(session.cached_timeline(), Some("tl1"));
    }

    #[test]
    fn racing_sessions_overwrite_with_last_result() {
        let server = TimelineServer {
            calls: Cell::new(0),
            fail: false,
        };
        // Two in-flight creations both saw an empty cache.
        let first = client().create_timeline(&server).unwrap();
        let second = client().create_timeline(&server).unwrap();
        let mut session = Session::new();
        session.store_timeline(first);
        session.store_timeline(second);
        assert_eq!(session.cached_timeline(), Some("tl2"));
        assert_eq!(session.get_or_create_timeline(&client(), &server).unwrap(), "tl2");
        assert_eq!(server.calls.get(), 2);
    }

    #[test]
    fn failure_leaves_cache_empty_and_reset_forgets() {
        let failing = TimelineServer {
            calls: Cell::new(0),
            fail: true,
        };
        let mut session = Session::new();
        assert!(session.get_or_create_timeline(&client(), &failing).is_err());
        assert_eq!(session.cached_timeline(), None);

        session.store_timeline("tl");
        session.reset();
        assert_eq!(session.cached_timeline(), None);
    }
}
