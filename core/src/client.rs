//! Signed request builder and response parser for the REST API.
//!
//! # Design
//! `RtmClient` holds credentials and endpoints and nothing else. Every API
//! operation is split into a `build_*` method that produces a signed
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Hosts with their own HTTP stack call the two halves directly; everyone
//! else goes through the matching convenience method, which runs them
//! around a `Transport`. Nothing is retried and nothing is cached.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Endpoints, Settings};
use crate::error::RtmError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::normalize::{build_list_map, non_empty_field, ListMap};
use crate::signature::sign;
use crate::tasks::{build_tasks, first_task_ref, FormattedTask, TaskRef};

pub const SIGNATURE_PARAM: &str = "api_sig";
pub const AUTH_PERMS: &str = "delete";

#[derive(Debug, Clone)]
pub struct RtmClient {
    settings: Settings,
    endpoints: Endpoints,
}

impl RtmClient {
    pub fn new(settings: Settings) -> Self {
        Self::with_endpoints(settings, Endpoints::default())
    }

    pub fn with_endpoints(settings: Settings, endpoints: Endpoints) -> Self {
        Self {
            settings,
            endpoints,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.settings.auth_token = token.into();
    }

    // -- generic calls ------------------------------------------------------

    /// Build a signed request for an authenticated API method.
    pub fn build_call(&self, method: &str, params: &[(&str, &str)]) -> Result<HttpRequest, RtmError> {
        self.require_app_keys()?;
        if self.settings.auth_token.is_empty() {
            return Err(RtmError::MissingCredentials("auth token"));
        }
        self.signed_request(method, params, Some(&self.settings.auth_token))
    }

    /// Build a signed request that carries no `auth_token`. Only the
    /// authentication bootstrap methods use this.
    pub fn build_call_without_token(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpRequest, RtmError> {
        self.require_app_keys()?;
        self.signed_request(method, params, None)
    }

    /// Validate the HTTP status and the `rsp.stat` envelope, returning the
    /// whole parsed body on success.
    pub fn parse_envelope(&self, response: HttpResponse) -> Result<Value, RtmError> {
        if !(200..300).contains(&response.status) {
            return Err(RtmError::Transport(format!("HTTP {}", response.status)));
        }
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| RtmError::Transport(format!("response is not JSON: {e}")))?;

        let stat = body
            .pointer("/rsp/stat")
            .and_then(Value::as_str)
            .ok_or_else(|| RtmError::malformed("envelope has no rsp.stat"))?;
        if stat == "ok" {
            return Ok(body);
        }

        let err = body.pointer("/rsp/err");
        let message = err
            .and_then(|e| non_empty_field(e, "msg"))
            .unwrap_or_else(|| "unknown".to_string());
        let code = err.and_then(|e| non_empty_field(e, "code"));
        warn!(code = code.as_deref().unwrap_or(""), %message, "API call failed");
        Err(RtmError::RemoteApi { code, message })
    }

    /// Sign, dispatch and validate one authenticated call.
    pub fn call<T: Transport + ?Sized>(
        &self,
        transport: &T,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, RtmError> {
        let request = self.build_call(method, params)?;
        self.parse_envelope(transport.execute(&request)?)
    }

    /// `call` for the authentication bootstrap methods.
    pub fn call_without_auth_token<T: Transport + ?Sized>(
        &self,
        transport: &T,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, RtmError> {
        let request = self.build_call_without_token(method, params)?;
        self.parse_envelope(transport.execute(&request)?)
    }

    // -- authentication -----------------------------------------------------

    pub fn build_get_frob(&self) -> Result<HttpRequest, RtmError> {
        self.build_call_without_token("rtm.auth.getFrob", &[])
    }

    pub fn parse_get_frob(&self, response: HttpResponse) -> Result<String, RtmError> {
        let body = self.parse_envelope(response)?;
        body.pointer("/rsp/frob")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RtmError::malformed("response has no frob"))
    }

    pub fn get_frob<T: Transport + ?Sized>(&self, transport: &T) -> Result<String, RtmError> {
        self.parse_get_frob(transport.execute(&self.build_get_frob()?)?)
    }

    /// Browser URL where the user grants `delete` permission for `frob`.
    /// The signature covers exactly `api_key`, `perms` and `frob`.
    pub fn auth_url(&self, frob: &str) -> Result<String, RtmError> {
        self.require_app_keys()?;
        let mut pairs = vec![
            ("api_key".to_string(), self.settings.api_key.clone()),
            ("perms".to_string(), AUTH_PERMS.to_string()),
            ("frob".to_string(), frob.to_string()),
        ];
        let sig = sign(&self.settings.shared_secret, pairs.clone());
        pairs.push((SIGNATURE_PARAM.to_string(), sig));
        let url = Url::parse_with_params(&self.endpoints.auth_url, &pairs)
            .map_err(|e| RtmError::Transport(format!("invalid auth URL: {e}")))?;
        Ok(url.into())
    }

    pub fn build_get_token(&self, frob: &str) -> Result<HttpRequest, RtmError> {
        self.build_call_without_token("rtm.auth.getToken", &[("frob", frob)])
    }

    pub fn parse_get_token(&self, response: HttpResponse) -> Result<String, RtmError> {
        let body = self.parse_envelope(response)?;
        body.pointer("/rsp/auth/token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RtmError::malformed("response has no auth token"))
    }

    pub fn get_token<T: Transport + ?Sized>(
        &self,
        transport: &T,
        frob: &str,
    ) -> Result<String, RtmError> {
        self.parse_get_token(transport.execute(&self.build_get_token(frob)?)?)
    }

    // -- lists and tasks ----------------------------------------------------

    pub fn build_get_lists(&self) -> Result<HttpRequest, RtmError> {
        self.build_call("rtm.lists.getList", &[])
    }

    pub fn parse_get_lists(&self, response: HttpResponse) -> Result<ListMap, RtmError> {
        Ok(build_list_map(&self.parse_envelope(response)?))
    }

    pub fn get_list_map<T: Transport + ?Sized>(&self, transport: &T) -> Result<ListMap, RtmError> {
        self.parse_get_lists(transport.execute(&self.build_get_lists()?)?)
    }

    pub fn build_get_tasks(&self, filter: &str) -> Result<HttpRequest, RtmError> {
        self.build_call("rtm.tasks.getList", &[("filter", filter)])
    }

    pub fn parse_get_tasks(
        &self,
        response: HttpResponse,
        list_map: &ListMap,
    ) -> Result<Vec<FormattedTask>, RtmError> {
        build_tasks(&self.parse_envelope(response)?, list_map)
    }

    /// Fetch the list map, then the tasks matching `filter`. The two calls
    /// run one after the other. List names are decoration: if the list call
    /// fails, tasks are still fetched and render without a list tag.
    pub fn fetch_tasks<T: Transport + ?Sized>(
        &self,
        transport: &T,
        filter: &str,
    ) -> Result<Vec<FormattedTask>, RtmError> {
        let list_map = self.get_list_map(transport).unwrap_or_else(|e| {
            warn!(error = %e, "list fetch failed, continuing without list names");
            ListMap::new()
        });
        let response = transport.execute(&self.build_get_tasks(filter)?)?;
        self.parse_get_tasks(response, &list_map)
    }

    // -- mutations ----------------------------------------------------------

    pub fn build_create_timeline(&self) -> Result<HttpRequest, RtmError> {
        self.build_call("rtm.timelines.create", &[])
    }

    pub fn parse_create_timeline(&self, response: HttpResponse) -> Result<String, RtmError> {
        let body = self.parse_envelope(response)?;
        body.pointer("/rsp")
            .and_then(|rsp| non_empty_field(rsp, "timeline"))
            .ok_or_else(|| RtmError::malformed("response has no timeline"))
    }

    pub fn create_timeline<T: Transport + ?Sized>(&self, transport: &T) -> Result<String, RtmError> {
        self.parse_create_timeline(transport.execute(&self.build_create_timeline()?)?)
    }

    /// `rtm.tasks.add` with smart-add parsing enabled.
    pub fn build_add_task(&self, timeline: &str, name: &str) -> Result<HttpRequest, RtmError> {
        self.build_call(
            "rtm.tasks.add",
            &[("timeline", timeline), ("name", name), ("parse", "1")],
        )
    }

    pub fn parse_add_task(&self, response: HttpResponse) -> Result<TaskRef, RtmError> {
        first_task_ref(&self.parse_envelope(response)?)
    }

    pub fn add_task<T: Transport + ?Sized>(
        &self,
        transport: &T,
        timeline: &str,
        name: &str,
    ) -> Result<TaskRef, RtmError> {
        self.parse_add_task(transport.execute(&self.build_add_task(timeline, name)?)?)
    }

    pub fn build_complete_task(&self, timeline: &str, task: &TaskRef) -> Result<HttpRequest, RtmError> {
        self.build_call(
            "rtm.tasks.complete",
            &[
                ("timeline", timeline),
                ("list_id", task.list_id.as_str()),
                ("taskseries_id", task.series_id.as_str()),
                ("task_id", task.task_id.as_str()),
            ],
        )
    }

    pub fn parse_complete_task(&self, response: HttpResponse) -> Result<(), RtmError> {
        self.parse_envelope(response).map(drop)
    }

    pub fn complete_task<T: Transport + ?Sized>(
        &self,
        transport: &T,
        timeline: &str,
        task: &TaskRef,
    ) -> Result<(), RtmError> {
        self.parse_complete_task(transport.execute(&self.build_complete_task(timeline, task)?)?)
    }

    // -- internals ----------------------------------------------------------

    fn require_app_keys(&self) -> Result<(), RtmError> {
        if self.settings.api_key.is_empty() {
            return Err(RtmError::MissingCredentials("api key"));
        }
        if self.settings.shared_secret.is_empty() {
            return Err(RtmError::MissingCredentials("shared secret"));
        }
        Ok(())
    }

    /// Merge the fixed parameters over the caller's, sign the full set and
    /// append `api_sig` last.
    fn signed_request(
        &self,
        method: &str,
        params: &[(&str, &str)],
        auth_token: Option<&str>,
    ) -> Result<HttpRequest, RtmError> {
        let mut merged: BTreeMap<String, String> = params
            .iter()
            .filter(|(k, _)| *k != SIGNATURE_PARAM)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        merged.insert("method".to_string(), method.to_string());
        merged.insert("api_key".to_string(), self.settings.api_key.clone());
        merged.insert("format".to_string(), "json".to_string());
        if let Some(token) = auth_token {
            merged.insert("auth_token".to_string(), token.to_string());
        }

        let sig = sign(&self.settings.shared_secret, &merged);
        let mut wire: Vec<(String, String)> = merged.into_iter().collect();
        wire.push((SIGNATURE_PARAM.to_string(), sig));

        let url = Url::parse_with_params(&self.endpoints.rest_url, &wire)
            .map_err(|e| RtmError::Transport(format!("invalid REST URL: {e}")))?;
        debug!(method, "built signed request");

        Ok(HttpRequest {
            url: url.into(),
            params: wire,
        })
    }
}
