//! C-ABI wrapper around `rtm-core`.
//!
//! # Overview
//! Lets a host editor written in any language with a C FFI build signed
//! requests, turn responses into markdown lines and manipulate tracked
//! lines, while keeping the HTTP round-trip on its own side.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `rtm_build_*` returns a signed `FfiHttpRequest` (null on missing
//!   credentials or arguments); `rtm_parse_*` / `rtm_render_tasks` return an
//!   `FfiRtmResult` envelope with a text payload.
//! - The timeline is returned to the host, which keeps it for the session.
//! - The C caller owns all returned pointers and must release them with the
//!   matching `rtm_free_*` function.

pub mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::catch_unwind;

use rtm_core::markdown::{encode_block, encode_new_task};
use rtm_core::{decode_line, extract_task_name, mark_complete, Endpoints, Settings};

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client from credentials. `auth_token` may be null before
/// authentication; `base_url` may be null to use the public service.
///
/// Returns null if `api_key` or `shared_secret` is null.
/// The caller must free the returned pointer with `rtm_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_client_new(
    api_key: *const c_char,
    shared_secret: *const c_char,
    auth_token: *const c_char,
    base_url: *const c_char,
) -> *mut FfiRtmClient {
    catch_unwind(|| {
        let (Some(api_key), Some(shared_secret)) =
            (unsafe { read_str(api_key) }, unsafe { read_str(shared_secret) })
        else {
            return std::ptr::null_mut();
        };
        let settings = Settings {
            api_key: api_key.to_string(),
            shared_secret: shared_secret.to_string(),
            auth_token: unsafe { read_str(auth_token) }.unwrap_or("").to_string(),
        };
        let endpoints = match unsafe { read_str(base_url) } {
            Some(base) => Endpoints::with_base(base),
            None => Endpoints::default(),
        };
        let client = rtm_core::RtmClient::with_endpoints(settings, endpoints);
        Box::into_raw(Box::new(FfiRtmClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `rtm_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_client_free(client: *mut FfiRtmClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

/// Store the token obtained from the authentication flow.
/// Does nothing if either argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_client_set_auth_token(client: *mut FfiRtmClient, auth_token: *const c_char) {
    let _ = catch_unwind(|| {
        if client.is_null() {
            return;
        }
        if let Some(token) = unsafe { read_str(auth_token) } {
            unsafe { &mut *client }.inner.set_auth_token(token);
        }
    });
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build the `rtm.auth.getFrob` request (no auth token needed).
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_get_frob(client: *const FfiRtmClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_get_frob() {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the browser URL that grants access to `frob`.
///
/// Returns null on null arguments or missing credentials. Free with
/// `rtm_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_auth_url(client: *const FfiRtmClient, frob: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        let Some(frob) = (unsafe { read_str(frob) }) else {
            return std::ptr::null_mut();
        };
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.auth_url(frob) {
            Ok(url) => into_c_string(url),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the `rtm.auth.getToken` request for an authorized `frob`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_get_token(
    client: *const FfiRtmClient,
    frob: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let Some(frob) = (unsafe { read_str(frob) }) else {
            return std::ptr::null_mut();
        };
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_get_token(frob) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the `rtm.lists.getList` request.
///
/// Returns null if `client` is null or credentials are incomplete.
/// The caller must free the returned pointer with `rtm_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_get_lists(client: *const FfiRtmClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_get_lists() {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the `rtm.tasks.getList` request for `filter`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_get_tasks(
    client: *const FfiRtmClient,
    filter: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let Some(filter) = (unsafe { read_str(filter) }) else {
            return std::ptr::null_mut();
        };
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_get_tasks(filter) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the `rtm.timelines.create` request.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_create_timeline(client: *const FfiRtmClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_create_timeline() {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the `rtm.tasks.add` request for the task text on `line`.
///
/// Returns null if any argument is null or the line holds no task text.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_add_task(
    client: *const FfiRtmClient,
    timeline: *const c_char,
    line: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(timeline), Some(line)) = (unsafe { read_str(timeline) }, unsafe { read_str(line) })
        else {
            return std::ptr::null_mut();
        };
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let name = extract_task_name(line);
        if name.is_empty() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match client.inner.build_add_task(timeline, &name) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build the `rtm.tasks.complete` request for the task tagged on `line`.
///
/// Returns null if any argument is null, the line has no id tag, or the
/// tag carries the `MISSING` list id.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_build_complete_task(
    client: *const FfiRtmClient,
    timeline: *const c_char,
    line: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(timeline), Some(line)) = (unsafe { read_str(timeline) }, unsafe { read_str(line) })
        else {
            return std::ptr::null_mut();
        };
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(task) = decode_line(line).filter(|t| t.is_addressable()) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        match client.inner.build_complete_task(timeline, &task) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Parse a `rtm.auth.getFrob` response. `text` is the frob.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_parse_get_frob(
    client: *const FfiRtmClient,
    response: *const FfiHttpResponse,
) -> *mut FfiRtmResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiRtmResult::null_arg("client");
        }
        if response.is_null() {
            return FfiRtmResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_get_frob(resp.to_core()) {
            Ok(frob) => FfiRtmResult::ok_text(frob, 0),
            Err(e) => FfiRtmResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_parse_get_frob"))
}

/// Parse a `rtm.auth.getToken` response. `text` is the auth token, which
/// the host persists and passes to `rtm_client_set_auth_token`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_parse_get_token(
    client: *const FfiRtmClient,
    response: *const FfiHttpResponse,
) -> *mut FfiRtmResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiRtmResult::null_arg("client");
        }
        if response.is_null() {
            return FfiRtmResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_get_token(resp.to_core()) {
            Ok(token) => FfiRtmResult::ok_text(token, 0),
            Err(e) => FfiRtmResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_parse_get_token"))
}

/// Parse a `rtm.timelines.create` response. `text` is the timeline.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_parse_create_timeline(
    client: *const FfiRtmClient,
    response: *const FfiHttpResponse,
) -> *mut FfiRtmResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiRtmResult::null_arg("client");
        }
        if response.is_null() {
            return FfiRtmResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_create_timeline(resp.to_core()) {
            Ok(timeline) => FfiRtmResult::ok_text(timeline, 0),
            Err(e) => FfiRtmResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_parse_create_timeline"))
}

/// Turn the list and task responses into a block of markdown lines.
///
/// `text` holds every line terminated by `\n`; `count` is the number of
/// tasks. Zero tasks is a success with an empty block. A failed lists
/// response only drops the list tags; the tasks response decides the result.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_render_tasks(
    client: *const FfiRtmClient,
    lists_response: *const FfiHttpResponse,
    tasks_response: *const FfiHttpResponse,
) -> *mut FfiRtmResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiRtmResult::null_arg("client");
        }
        if lists_response.is_null() {
            return FfiRtmResult::null_arg("lists_response");
        }
        if tasks_response.is_null() {
            return FfiRtmResult::null_arg("tasks_response");
        }
        let client = unsafe { &*client };
        let lists = unsafe { &*lists_response };
        let tasks = unsafe { &*tasks_response };

        let list_map = client
            .inner
            .parse_get_lists(lists.to_core())
            .unwrap_or_default();
        match client.inner.parse_get_tasks(tasks.to_core(), &list_map) {
            Ok(tasks) => {
                let count = u32::try_from(tasks.len()).unwrap_or(u32::MAX);
                FfiRtmResult::ok_text(encode_block(&tasks), count)
            }
            Err(e) => FfiRtmResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_render_tasks"))
}

/// Parse a `rtm.tasks.add` response for the task created from `line`.
/// `text` is the replacement line carrying the new id tag.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_parse_add_task(
    client: *const FfiRtmClient,
    response: *const FfiHttpResponse,
    line: *const c_char,
) -> *mut FfiRtmResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiRtmResult::null_arg("client");
        }
        if response.is_null() {
            return FfiRtmResult::null_arg("response");
        }
        let Some(line) = (unsafe { read_str(line) }) else {
            return FfiRtmResult::null_arg("line");
        };
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_add_task(resp.to_core()) {
            Ok(task) => FfiRtmResult::ok_text(encode_new_task(&extract_task_name(line), &task), 0),
            Err(e) => FfiRtmResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_parse_add_task"))
}

/// Parse a `rtm.tasks.complete` response. `text` is `line` with its
/// checkbox ticked.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_parse_complete_task(
    client: *const FfiRtmClient,
    response: *const FfiHttpResponse,
    line: *const c_char,
) -> *mut FfiRtmResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiRtmResult::null_arg("client");
        }
        if response.is_null() {
            return FfiRtmResult::null_arg("response");
        }
        let Some(line) = (unsafe { read_str(line) }) else {
            return FfiRtmResult::null_arg("line");
        };
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_complete_task(resp.to_core()) {
            Ok(()) => FfiRtmResult::ok_text(mark_complete(line), 0),
            Err(e) => FfiRtmResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_parse_complete_task"))
}

// ---------------------------------------------------------------------------
// Line codec
// ---------------------------------------------------------------------------

/// Decode the id tag on `line` into its three ids.
///
/// Returns null if `line` is null or carries no id tag. Free with
/// `rtm_free_task_ref`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_decode_task_ref(line: *const c_char) -> *mut FfiTaskRef {
    catch_unwind(|| match unsafe { read_str(line) }.and_then(decode_line) {
        Some(task) => FfiTaskRef::from_core(task),
        None => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Check that `line` carries an id tag usable for completion.
///
/// On success `text` is `list:series:task`. A line without a tag, or with
/// the `MISSING` list id, yields `NoMatch`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_check_line(line: *const c_char) -> *mut FfiRtmResult {
    catch_unwind(|| {
        let Some(line) = (unsafe { read_str(line) }) else {
            return FfiRtmResult::null_arg("line");
        };
        match decode_line(line).filter(|t| t.is_addressable()) {
            Some(task) => FfiRtmResult::ok_text(
                format!("{}:{}:{}", task.list_id, task.series_id, task.task_id),
                0,
            ),
            None => FfiRtmResult::no_match(line),
        }
    })
    .unwrap_or_else(|_| FfiRtmResult::panic("panic in rtm_check_line"))
}

/// Task text of `line` without its bullet or checkbox. Null if `line` is
/// null. Free with `rtm_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_extract_task_name(line: *const c_char) -> *mut c_char {
    catch_unwind(|| match unsafe { read_str(line) } {
        Some(line) => into_c_string(extract_task_name(line)),
        None => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

/// `line` with its first unchecked checkbox ticked. Null if `line` is null.
/// Free with `rtm_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_mark_complete(line: *const c_char) -> *mut c_char {
    catch_unwind(|| match unsafe { read_str(line) } {
        Some(line) => into_c_string(mark_complete(line)),
        None => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `rtm_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
    });
}

/// Free an `FfiRtmResult`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_free_result(result: *mut FfiRtmResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.text);
    });
}

/// Free an `FfiTaskRef` returned by `rtm_decode_task_ref`. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_free_task_ref(task: *mut FfiTaskRef) {
    if task.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let task = unsafe { Box::from_raw(task) };
        free_c_string(task.list_id);
        free_c_string(task.series_id);
        free_c_string(task.task_id);
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rtm_free_string(s: *mut c_char) {
    let _ = catch_unwind(|| free_c_string(s));
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    const LISTS_BODY: &str =
        r#"{"rsp":{"stat":"ok","lists":{"list":[{"id":"101","name":"Inbox"},{"id":"102","name":"Work"}]}}}"#;
    const TASKS_BODY: &str = r#"{"rsp":{"stat":"ok","tasks":{"list":{"id":"101","taskseries":{"id":"33","name":"Buy milk","tags":{"tag":"errand"},"task":{"id":"55","priority":"1","due":"2024-05-01T00:00:00Z"}}}}}}"#;

    fn new_client() -> *mut FfiRtmClient {
        let key = CString::new("key").unwrap();
        let secret = CString::new("secret").unwrap();
        let token = CString::new("token").unwrap();
        let base = CString::new("http://localhost:3000").unwrap();
        rtm_client_new(key.as_ptr(), secret.as_ptr(), token.as_ptr(), base.as_ptr())
    }

    fn text_of(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    #[test]
    fn client_new_and_free() {
        let client = new_client();
        assert!(!client.is_null());
        rtm_client_free(client);
    }

    #[test]
    fn client_new_null_key_returns_null() {
        let secret = CString::new("secret").unwrap();
        let client = rtm_client_new(
            std::ptr::null(),
            secret.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
        );
        assert!(client.is_null());
    }

    #[test]
    fn client_free_null_is_safe() {
        rtm_client_free(std::ptr::null_mut());
    }

    #[test]
    fn build_get_lists_is_signed() {
        let client = new_client();
        let req = rtm_build_get_lists(client);
        assert!(!req.is_null());

        let url = text_of(unsafe { &*req }.url);
        assert!(url.starts_with("http://localhost:3000/services/rest/?"));
        assert!(url.contains("method=rtm.lists.getList"));
        assert!(url.contains("auth_token=token"));
        assert!(url.contains("&api_sig="));

        rtm_free_request(req);
        rtm_client_free(client);
    }

    #[test]
    fn build_without_token_returns_null() {
        let key = CString::new("key").unwrap();
        let secret = CString::new("secret").unwrap();
        let client = rtm_client_new(
            key.as_ptr(),
            secret.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
        );
        assert!(rtm_build_get_lists(client).is_null());

        // Bootstrap calls only need the app keys.
        let req = rtm_build_get_frob(client);
        assert!(!req.is_null());
        rtm_free_request(req);

        let token = CString::new("token").unwrap();
        rtm_client_set_auth_token(client, token.as_ptr());
        let req = rtm_build_get_lists(client);
        assert!(!req.is_null());
        rtm_free_request(req);
        rtm_client_free(client);
    }

    #[test]
    fn build_null_client_returns_null() {
        assert!(rtm_build_get_lists(std::ptr::null()).is_null());
        assert!(rtm_build_create_timeline(std::ptr::null()).is_null());
    }

    #[test]
    fn build_add_task_rejects_empty_line() {
        let client = new_client();
        let timeline = CString::new("777").unwrap();
        let empty = CString::new("- [ ] ").unwrap();
        assert!(rtm_build_add_task(client, timeline.as_ptr(), empty.as_ptr()).is_null());

        let line = CString::new("- [ ] Buy bread").unwrap();
        let req = rtm_build_add_task(client, timeline.as_ptr(), line.as_ptr());
        assert!(!req.is_null());
        let url = text_of(unsafe { &*req }.url);
        assert!(url.contains("name=Buy+bread"));
        assert!(url.contains("parse=1"));
        rtm_free_request(req);
        rtm_client_free(client);
    }

    #[test]
    fn build_complete_task_requires_addressable_tag() {
        let client = new_client();
        let timeline = CString::new("777").unwrap();

        let untracked = CString::new("- [ ] Buy milk").unwrap();
        assert!(rtm_build_complete_task(client, timeline.as_ptr(), untracked.as_ptr()).is_null());

        let missing = CString::new("- [ ] [🐮](rtm:MISSING:33:55) Buy milk").unwrap();
        assert!(rtm_build_complete_task(client, timeline.as_ptr(), missing.as_ptr()).is_null());

        let tracked = CString::new("- [ ] [🐮](rtm:101:33:55) Buy milk").unwrap();
        let req = rtm_build_complete_task(client, timeline.as_ptr(), tracked.as_ptr());
        assert!(!req.is_null());
        let url = text_of(unsafe { &*req }.url);
        assert!(url.contains("list_id=101"));
        assert!(url.contains("taskseries_id=33"));
        assert!(url.contains("task_id=55"));
        rtm_free_request(req);
        rtm_client_free(client);
    }

    #[test]
    fn render_tasks_produces_lines() {
        let client = new_client();
        let lists_body = CString::new(LISTS_BODY).unwrap();
        let tasks_body = CString::new(TASKS_BODY).unwrap();
        let lists = FfiHttpResponse {
            status: 200,
            body: lists_body.as_ptr(),
        };
        let tasks = FfiHttpResponse {
            status: 200,
            body: tasks_body.as_ptr(),
        };

        let result = rtm_render_tasks(client, &lists, &tasks);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.count, 1);
        assert_eq!(
            text_of(r.text),
            "- [ ] [🐮](rtm:101:33:55) Buy milk 🔺 📅 2024-05-01 #Inbox #errand\n"
        );

        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn render_tasks_without_list_names() {
        let client = new_client();
        let lists_body = CString::new(
            r#"{"rsp":{"stat":"fail","err":{"code":"105","msg":"Service currently unavailable"}}}"#,
        )
        .unwrap();
        let tasks_body = CString::new(TASKS_BODY).unwrap();
        let lists = FfiHttpResponse {
            status: 200,
            body: lists_body.as_ptr(),
        };
        let tasks = FfiHttpResponse {
            status: 200,
            body: tasks_body.as_ptr(),
        };

        let result = rtm_render_tasks(client, &lists, &tasks);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.count, 1);
        assert_eq!(
            text_of(r.text),
            "- [ ] [🐮](rtm:101:33:55) Buy milk 🔺 📅 2024-05-01 #errand\n"
        );

        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn render_tasks_remote_failure() {
        let client = new_client();
        let lists_body = CString::new(LISTS_BODY).unwrap();
        let tasks_body = CString::new(
            r#"{"rsp":{"stat":"fail","err":{"code":"98","msg":"Login failed / Invalid auth token"}}}"#,
        )
        .unwrap();
        let lists = FfiHttpResponse {
            status: 200,
            body: lists_body.as_ptr(),
        };
        let tasks = FfiHttpResponse {
            status: 200,
            body: tasks_body.as_ptr(),
        };

        let result = rtm_render_tasks(client, &lists, &tasks);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::RemoteApi);
        assert!(r.text.is_null());
        assert!(text_of(r.error_message).contains("Invalid auth token"));

        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn parse_http_error_is_transport() {
        let client = new_client();
        let body = CString::new("gateway down").unwrap();
        let resp = FfiHttpResponse {
            status: 502,
            body: body.as_ptr(),
        };
        let result = rtm_parse_create_timeline(client, &resp);
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Transport);
        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn parse_null_arguments() {
        let client = new_client();
        let result = rtm_parse_create_timeline(std::ptr::null(), std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        rtm_free_result(result);

        let result = rtm_parse_create_timeline(client, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn parse_add_task_rewrites_line() {
        let client = new_client();
        let body = CString::new(
            r#"{"rsp":{"stat":"ok","list":{"id":"101","taskseries":{"id":"40","name":"Buy bread","task":{"id":"60"}}}}}"#,
        )
        .unwrap();
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let line = CString::new("* Buy bread").unwrap();

        let result = rtm_parse_add_task(client, &resp, line.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(text_of(r.text), "- [ ] [🐮](rtm:101:40:60) Buy bread");

        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn parse_complete_task_ticks_checkbox() {
        let client = new_client();
        let body = CString::new(r#"{"rsp":{"stat":"ok"}}"#).unwrap();
        let resp = FfiHttpResponse {
            status: 200,
            body: body.as_ptr(),
        };
        let line = CString::new("- [ ] [🐮](rtm:101:33:55) Buy milk").unwrap();

        let result = rtm_parse_complete_task(client, &resp, line.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(text_of(r.text), "- [x] [🐮](rtm:101:33:55) Buy milk");

        rtm_free_result(result);
        rtm_client_free(client);
    }

    #[test]
    fn decode_task_ref_splits_ids() {
        let line = CString::new("- [ ] [🐮](rtm:101:33:55) Buy milk").unwrap();
        let task = rtm_decode_task_ref(line.as_ptr());
        assert!(!task.is_null());
        let t = unsafe { &*task };
        assert_eq!(text_of(t.list_id), "101");
        assert_eq!(text_of(t.series_id), "33");
        assert_eq!(text_of(t.task_id), "55");
        rtm_free_task_ref(task);

        let plain = CString::new("- [ ] Buy milk").unwrap();
        assert!(rtm_decode_task_ref(plain.as_ptr()).is_null());
    }

    #[test]
    fn check_line_reports_no_match() {
        let line = CString::new("- [ ] [🐮](rtm:MISSING:33:55) Buy milk").unwrap();
        let result = rtm_check_line(line.as_ptr());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NoMatch);
        rtm_free_result(result);

        let line = CString::new("- [ ] [🐮](rtm:101:33:55) Buy milk").unwrap();
        let result = rtm_check_line(line.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(text_of(r.text), "101:33:55");
        assert_eq!(r.count, 0);
        rtm_free_result(result);
    }

    #[test]
    fn string_helpers() {
        let line = CString::new("- [ ] Water plants").unwrap();
        let name = rtm_extract_task_name(line.as_ptr());
        assert_eq!(text_of(name), "Water plants");
        rtm_free_string(name);

        let done = rtm_mark_complete(line.as_ptr());
        assert_eq!(text_of(done), "- [x] Water plants");
        rtm_free_string(done);

        assert!(rtm_mark_complete(std::ptr::null()).is_null());
    }

    #[test]
    fn free_null_is_safe() {
        rtm_free_request(std::ptr::null_mut());
        rtm_free_result(std::ptr::null_mut());
        rtm_free_task_ref(std::ptr::null_mut());
        rtm_free_string(std::ptr::null_mut());
    }
}
