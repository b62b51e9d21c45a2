//! In-memory stand-in for the Remember The Milk REST endpoint.
//!
//! Verifies `api_key` and recomputes `api_sig` on every request, then
//! answers the handful of methods the bridge uses. Like the real service it
//! answers HTTP 200 with `rsp.stat = "fail"` for API errors and collapses
//! one-element collections into bare objects. `/services/auth/` stands in
//! for the browser page where the user grants access to a frob.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const API_KEY: &str = "mock-api-key";
pub const SHARED_SECRET: &str = "mock-shared-secret";

const TIMESTAMP: &str = "2024-04-01T09:00:00Z";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockList {
    pub id: String,
    pub name: String,
}

/// One task series with a single occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockTask {
    pub list_id: String,
    pub series_id: String,
    pub task_id: String,
    pub name: String,
    pub due: String,
    pub priority: String,
    pub tags: Vec<String>,
    pub completed: bool,
}

#[derive(Debug)]
pub struct MockState {
    pub api_key: String,
    pub shared_secret: String,
    pub lists: Vec<MockList>,
    pub tasks: Vec<MockTask>,
    /// Issued frobs and whether the user has authorized them.
    pub frobs: HashMap<String, bool>,
    pub tokens: HashSet<String>,
    pub timelines: HashSet<String>,
    next_id: u64,
}

pub type Db = Arc<RwLock<MockState>>;

impl MockState {
    pub fn new(api_key: &str, shared_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            shared_secret: shared_secret.to_string(),
            lists: Vec::new(),
            tasks: Vec::new(),
            frobs: HashMap::new(),
            tokens: HashSet::new(),
            timelines: HashSet::new(),
            next_id: 1000,
        }
    }

    /// Two lists and two incomplete tasks, keyed with `API_KEY`/`SHARED_SECRET`.
    pub fn seeded() -> Self {
        let mut state = Self::new(API_KEY, SHARED_SECRET);
        state.lists = vec![
            MockList {
                id: "101".to_string(),
                name: "Inbox".to_string(),
            },
            MockList {
                id: "102".to_string(),
                name: "Work Stuff, Inc.".to_string(),
            },
        ];
        state.tasks = vec![
            MockTask {
                list_id: "101".to_string(),
                series_id: "33".to_string(),
                task_id: "55".to_string(),
                name: "Buy milk".to_string(),
                due: "2024-05-01T00:00:00Z".to_string(),
                priority: "1".to_string(),
                tags: vec!["errand".to_string()],
                completed: false,
            },
            MockTask {
                list_id: "102".to_string(),
                series_id: "34".to_string(),
                task_id: "56".to_string(),
                name: "Ship release".to_string(),
                due: String::new(),
                priority: "N".to_string(),
                tags: Vec::new(),
                completed: false,
            },
        ];
        state
    }

    /// Pre-register an auth token, skipping the frob handshake.
    pub fn with_token(mut self, token: &str) -> Self {
        self.tokens.insert(token.to_string());
        self
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    /// Answer one REST call. Always returns an envelope.
    pub fn handle(&mut self, params: &HashMap<String, String>) -> Value {
        let method = params.get("method").map(String::as_str).unwrap_or_default();
        debug!(method, "mock request");

        if params.get("api_key") != Some(&self.api_key) {
            return fail(100, "Invalid API Key");
        }
        match params.get("api_sig") {
            None => return fail(97, "Missing signature"),
            Some(sig) if *sig != signature(&self.shared_secret, params) => {
                return fail(96, "Invalid signature")
            }
            Some(_) => {}
        }

        match method {
            "rtm.auth.getFrob" => {
                let frob = format!("frob{}", self.next_id());
                self.frobs.insert(frob.clone(), false);
                ok(json!({"frob": frob}))
            }
            "rtm.auth.getToken" => self.get_token(params),
            _ => {
                let authed = params
                    .get("auth_token")
                    .is_some_and(|t| self.tokens.contains(t));
                if !authed {
                    return fail(98, "Login failed / Invalid auth token");
                }
                self.authenticated(method, params)
            }
        }
    }

    fn authenticated(&mut self, method: &str, params: &HashMap<String, String>) -> Value {
        match method {
            "rtm.lists.getList" => {
                let lists: Vec<Value> = self
                    .lists
                    .iter()
                    .map(|l| json!({"id": l.id, "name": l.name, "deleted": "0", "locked": "0", "archived": "0", "smart": "0"}))
                    .collect();
                ok(json!({"lists": {"list": collapse(lists)}}))
            }
            "rtm.timelines.create" => {
                let timeline = self.next_id();
                self.timelines.insert(timeline.clone());
                ok(json!({"timeline": timeline}))
            }
            "rtm.tasks.getList" => {
                let filter = params.get("filter").map(String::as_str).unwrap_or_default();
                self.get_tasks(filter)
            }
            "rtm.tasks.add" | "rtm.tasks.complete" => {
                let timeline_ok = params
                    .get("timeline")
                    .is_some_and(|t| self.timelines.contains(t));
                if !timeline_ok {
                    return fail(300, "Timeline invalid or not provided");
                }
                if method == "rtm.tasks.add" {
                    self.add_task(params)
                } else {
                    self.complete_task(params)
                }
            }
            other => fail(112, &format!("Method \"{other}\" not found")),
        }
    }

    fn get_token(&mut self, params: &HashMap<String, String>) -> Value {
        let frob = params.get("frob").cloned().unwrap_or_default();
        if self.frobs.get(&frob) != Some(&true) {
            return fail(101, "Invalid frob - did you authenticate?");
        }
        self.frobs.remove(&frob);
        let token = format!("token{}", self.next_id());
        self.tokens.insert(token.clone());
        info!("issued auth token");
        ok(json!({"auth": {
            "token": token,
            "perms": "delete",
            "user": {"id": "1", "username": "mock", "fullname": "Mock User"}
        }}))
    }

    fn get_tasks(&self, filter: &str) -> Value {
        let matching: Vec<&MockTask> = self
            .tasks
            .iter()
            .filter(|t| matches_filter(t, &self.lists, filter))
            .collect();
        let lists: Vec<Value> = self
            .lists
            .iter()
            .filter_map(|list| {
                let series: Vec<Value> = matching
                    .iter()
                    .filter(|t| t.list_id == list.id)
                    .map(|t| series_json(t))
                    .collect();
                (!series.is_empty()).then(|| json!({"id": list.id, "taskseries": collapse(series)}))
            })
            .collect();

        if lists.is_empty() {
            return ok(json!({"tasks": {"rev": "mockrev"}}));
        }
        ok(json!({"tasks": {"rev": "mockrev", "list": collapse(lists)}}))
    }

    fn add_task(&mut self, params: &HashMap<String, String>) -> Value {
        let raw = params.get("name").map(|n| n.trim().to_string()).unwrap_or_default();
        if raw.is_empty() {
            return fail(4000, "Task name provided is invalid.");
        }
        let Some(default_list) = self.lists.first().map(|l| l.id.clone()) else {
            return fail(3000, "List ID invalid or not provided.");
        };

        let mut task = MockTask {
            list_id: params.get("list_id").cloned().unwrap_or(default_list),
            series_id: self.next_id(),
            task_id: self.next_id(),
            name: raw.clone(),
            due: String::new(),
            priority: "N".to_string(),
            tags: Vec::new(),
            completed: false,
        };
        if params.get("parse").map(String::as_str) == Some("1") {
            self.smart_add(&mut task, &raw);
        }

        let response = ok(json!({
            "transaction": {"id": self.next_id(), "undoable": "0"},
            "list": {"id": task.list_id, "taskseries": series_json(&task)}
        }));
        self.tasks.push(task);
        response
    }

    /// Minimal smart-add: `!1`..`!3` sets priority, `#name` picks a list if
    /// one matches and otherwise adds a tag.
    fn smart_add(&self, task: &mut MockTask, raw: &str) {
        let mut words = Vec::new();
        for word in raw.split_whitespace() {
            match word {
                "!1" | "!2" | "!3" => task.priority = word[1..].to_string(),
                w if w.len() > 1 && w.starts_with('#') => {
                    let label = &w[1..];
                    match self.lists.iter().find(|l| l.name.eq_ignore_ascii_case(label)) {
                        Some(list) => task.list_id = list.id.clone(),
                        None => task.tags.push(label.to_string()),
                    }
                }
                w => words.push(w),
            }
        }
        task.name = words.join(" ");
    }

    fn complete_task(&mut self, params: &HashMap<String, String>) -> Value {
        let get = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();
        let (list_id, series_id, task_id) = (get("list_id"), get("taskseries_id"), get("task_id"));
        let Some(task) = self
            .tasks
            .iter_mut()
            .find(|t| t.list_id == list_id && t.series_id == series_id && t.task_id == task_id)
        else {
            return fail(340, "taskseries_id/task_id invalid or not provided");
        };
        task.completed = true;
        let series = series_json(task);
        ok(json!({
            "transaction": {"id": self.next_id(), "undoable": "1"},
            "list": {"id": list_id, "taskseries": series}
        }))
    }
}

/// `md5(secret + k1 + v1 + k2 + v2 …)` over every parameter except
/// `api_sig`, keys in byte order.
pub fn signature(shared_secret: &str, params: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&str, &str> = params
        .iter()
        .filter(|(k, _)| k.as_str() != "api_sig")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let mut input = shared_secret.to_string();
    for (k, v) in sorted {
        input.push_str(k);
        input.push_str(v);
    }
    format!("{:x}", md5::compute(input))
}

/// Supported filter terms: `status:incomplete`, `status:completed`,
/// `list:NAME` and `priority:N`, joined by whitespace or `AND`. Unknown
/// terms match everything.
fn matches_filter(task: &MockTask, lists: &[MockList], filter: &str) -> bool {
    filter
        .split_whitespace()
        .filter(|term| !term.eq_ignore_ascii_case("and"))
        .all(|term| match term.split_once(':') {
            Some(("status", "incomplete")) => !task.completed,
            Some(("status", "completed")) => task.completed,
            Some(("priority", p)) => task.priority == p,
            Some(("list", name)) => lists
                .iter()
                .any(|l| l.id == task.list_id && l.name.eq_ignore_ascii_case(name)),
            _ => true,
        })
}

fn series_json(task: &MockTask) -> Value {
    let tags = if task.tags.is_empty() {
        json!([])
    } else {
        json!({"tag": collapse(task.tags.iter().map(|t| json!(t)).collect())})
    };
    json!({
        "id": task.series_id,
        "created": TIMESTAMP,
        "modified": TIMESTAMP,
        "name": task.name,
        "source": "api",
        "url": "",
        "location_id": "",
        "tags": tags,
        "participants": [],
        "notes": [],
        "task": {
            "id": task.task_id,
            "due": task.due,
            "has_due_time": "0",
            "added": TIMESTAMP,
            "completed": if task.completed { TIMESTAMP } else { "" },
            "deleted": "",
            "priority": task.priority,
            "postponed": "0",
            "estimate": ""
        }
    })
}

/// The service's singleton collapse: one element is returned bare.
fn collapse(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        return items.remove(0);
    }
    Value::Array(items)
}

fn ok(payload: Value) -> Value {
    let mut rsp = json!({"stat": "ok"});
    if let (Some(rsp_obj), Value::Object(fields)) = (rsp.as_object_mut(), payload) {
        rsp_obj.extend(fields);
    }
    json!({"rsp": rsp})
}

fn fail(code: u32, msg: &str) -> Value {
    json!({"rsp": {"stat": "fail", "err": {"code": code.to_string(), "msg": msg}}})
}

pub fn app() -> Router {
    app_with_state(Arc::new(RwLock::new(MockState::seeded())))
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/services/rest/", get(rest))
        .route("/services/auth/", get(authorize))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

async fn rest(State(db): State<Db>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(db.write().await.handle(&params))
}

/// The user clicking "allow" on the authorization page.
async fn authorize(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let mut state = db.write().await;
    if params.get("api_key") != Some(&state.api_key) {
        return (StatusCode::BAD_REQUEST, "Invalid API Key".to_string());
    }
    if params.get("api_sig") != Some(&signature(&state.shared_secret, &params)) {
        return (StatusCode::BAD_REQUEST, "Invalid signature".to_string());
    }
    if params.get("perms").map(String::as_str) != Some("delete") {
        return (StatusCode::BAD_REQUEST, "Invalid permissions".to_string());
    }
    let frob = params.get("frob").cloned().unwrap_or_default();
    match state.frobs.get_mut(&frob) {
        Some(granted) => {
            *granted = true;
            (StatusCode::OK, "Application successfully authorized.".to_string())
        }
        None => (StatusCode::BAD_REQUEST, "Invalid frob".to_string()),
    }
}
