use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rtm_mock_server::{app, app_with_state, signature, Db, MockState, API_KEY, SHARED_SECRET};
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Build `path?…&api_sig=…` for plain-ASCII parameters; spaces go on the
/// wire as `+`.
fn signed_uri(path: &str, pairs: &[(&str, &str)]) -> String {
    let params: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let sig = signature(SHARED_SECRET, &params);
    let query: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", v.replace(' ', "+")))
        .collect();
    format!("{path}?{}&api_sig={sig}", query.join("&"))
}

fn rest(pairs: &[(&str, &str)]) -> Request<String> {
    let mut all = vec![("api_key", API_KEY), ("format", "json")];
    all.extend_from_slice(pairs);
    Request::builder()
        .uri(signed_uri("/services/rest/", &all))
        .body(String::new())
        .unwrap()
}

fn seeded_db() -> Db {
    Arc::new(RwLock::new(MockState::seeded().with_token("tok")))
}

// --- envelope ---

#[tokio::test]
async fn failures_are_http_200_with_fail_stat() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/services/rest/?method=rtm.auth.getFrob&api_key=wrong&api_sig=x")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["rsp"]["stat"], "fail");
    assert_eq!(json["rsp"]["err"]["code"], "100");
    assert_eq!(json["rsp"]["err"]["msg"], "Invalid API Key");
}

#[tokio::test]
async fn unknown_method_is_reported() {
    let resp = app_with_state(seeded_db())
        .oneshot(rest(&[("method", "rtm.nope"), ("auth_token", "tok")]))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["rsp"]["err"]["code"], "112");
}

// --- lists ---

#[tokio::test]
async fn lists_are_returned_as_array_when_several() {
    let resp = app_with_state(seeded_db())
        .oneshot(rest(&[("method", "rtm.lists.getList"), ("auth_token", "tok")]))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["rsp"]["stat"], "ok");
    let lists = json["rsp"]["lists"]["list"].as_array().unwrap();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0]["name"], "Inbox");
}

// --- tasks ---

#[tokio::test]
async fn tasks_filtered_by_list() {
    let resp = app_with_state(seeded_db())
        .oneshot(rest(&[
            ("method", "rtm.tasks.getList"),
            ("auth_token", "tok"),
            ("filter", "list:Inbox"),
        ]))
        .await
        .unwrap();
    let json = body_json(resp).await;
    let list = &json["rsp"]["tasks"]["list"];
    assert_eq!(list["id"], "101");
    assert_eq!(list["taskseries"]["name"], "Buy milk");
}

// --- auth handshake ---

#[tokio::test]
async fn frob_must_be_authorized_before_token() {
    let db = seeded_db();

    let resp = app_with_state(db.clone())
        .oneshot(rest(&[("method", "rtm.auth.getFrob")]))
        .await
        .unwrap();
    let frob = body_json(resp).await["rsp"]["frob"].as_str().unwrap().to_string();

    let resp = app_with_state(db.clone())
        .oneshot(rest(&[("method", "rtm.auth.getToken"), ("frob", frob.as_str())]))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["rsp"]["err"]["code"], "101");

    let auth_uri = signed_uri(
        "/services/auth/",
        &[("api_key", API_KEY), ("perms", "delete"), ("frob", frob.as_str())],
    );
    let resp = app_with_state(db.clone())
        .oneshot(Request::builder().uri(auth_uri).body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "Application successfully authorized.");

    let resp = app_with_state(db.clone())
        .oneshot(rest(&[("method", "rtm.auth.getToken"), ("frob", frob.as_str())]))
        .await
        .unwrap();
    let json = body_json(resp).await;
    let token = json["rsp"]["auth"]["token"].as_str().unwrap();
    assert!(db.read().await.tokens.contains(token));
}

#[tokio::test]
async fn auth_page_rejects_bad_signature() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri(format!("/services/auth/?api_key={API_KEY}&perms=delete&frob=f&api_sig=bad"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- add / complete lifecycle ---

#[tokio::test]
async fn add_then_complete() {
    let db = seeded_db();

    let resp = app_with_state(db.clone())
        .oneshot(rest(&[("method", "rtm.timelines.create"), ("auth_token", "tok")]))
        .await
        .unwrap();
    let timeline = body_json(resp).await["rsp"]["timeline"].as_str().unwrap().to_string();

    let resp = app_with_state(db.clone())
        .oneshot(rest(&[
            ("method", "rtm.tasks.add"),
            ("auth_token", "tok"),
            ("timeline", timeline.as_str()),
            ("name", "Walk dog"),
        ]))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["rsp"]["stat"], "ok");
    let list_id = json["rsp"]["list"]["id"].as_str().unwrap().to_string();
    let series = &json["rsp"]["list"]["taskseries"];
    assert_eq!(series["name"], "Walk dog");
    let series_id = series["id"].as_str().unwrap().to_string();
    let task_id = series["task"]["id"].as_str().unwrap().to_string();

    let resp = app_with_state(db.clone())
        .oneshot(rest(&[
            ("method", "rtm.tasks.complete"),
            ("auth_token", "tok"),
            ("timeline", timeline.as_str()),
            ("list_id", list_id.as_str()),
            ("taskseries_id", series_id.as_str()),
            ("task_id", task_id.as_str()),
        ]))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["rsp"]["stat"], "ok");
    assert_ne!(json["rsp"]["list"]["taskseries"]["task"]["completed"], "");

    let state = db.read().await;
    let added = state.tasks.iter().find(|t| t.task_id == task_id).unwrap();
    assert!(added.completed);
}

#[tokio::test]
async fn complete_unknown_task_fails() {
    let db = seeded_db();
    db.write().await.timelines.insert("tl".to_string());
    let resp = app_with_state(db)
        .oneshot(rest(&[
            ("method", "rtm.tasks.complete"),
            ("auth_token", "tok"),
            ("timeline", "tl"),
            ("list_id", "101"),
            ("taskseries_id", "1"),
            ("task_id", "2"),
        ]))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["rsp"]["err"]["code"], "340");
}
