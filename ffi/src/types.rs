//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*mut c_char` instead of `String`, and enums with explicit discriminants.
//! Conversion helpers live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use rtm_core::{RtmError, TaskRef};

/// Opaque handle to an `RtmClient`. C callers receive a pointer to this and
/// pass it back into every FFI function.
pub struct FfiRtmClient {
    pub(crate) inner: rtm_core::RtmClient,
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

/// Borrow a C string as UTF-8. Null and invalid UTF-8 read as `None`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives
/// the returned reference.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Hand a Rust string to C. Interior NULs cannot cross the boundary and
/// are dropped.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let clean = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(clean).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A signed GET request. The C caller fetches `url` and passes the answer
/// back through an `rtm_parse_*` function.
#[repr(C)]
pub struct FfiHttpRequest {
    pub url: *mut c_char,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: rtm_core::HttpRequest) -> *mut Self {
        Box::into_raw(Box::new(FfiHttpRequest {
            url: into_c_string(req.url),
        }))
    }
}

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing a request.
/// The FFI layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

impl FfiHttpResponse {
    pub(crate) fn to_core(&self) -> rtm_core::HttpResponse {
        rtm_core::HttpResponse {
            status: self.status,
            body: unsafe { read_str(self.body) }.unwrap_or("").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task reference
// ---------------------------------------------------------------------------

/// The id tag of a line, as three C strings.
#[repr(C)]
pub struct FfiTaskRef {
    pub list_id: *mut c_char,
    pub series_id: *mut c_char,
    pub task_id: *mut c_char,
}

impl FfiTaskRef {
    pub(crate) fn from_core(task: TaskRef) -> *mut Self {
        Box::into_raw(Box::new(FfiTaskRef {
            list_id: into_c_string(task.list_id),
            series_id: into_c_string(task.series_id),
            task_id: into_c_string(task.task_id),
        }))
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiRtmResult`.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    MissingCredentials = 1,
    Transport = 2,
    RemoteApi = 3,
    MalformedResponse = 4,
    NoMatch = 5,
    Panic = 6,
    NullArg = 7,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null and `text`
/// holds the produced text (a timeline, a line, or a block of lines).
/// `count` is the number of rendered tasks for `rtm_render_tasks`, else 0.
/// On failure `text` is null and `error_message` is a human-readable
/// C string.
#[repr(C)]
pub struct FfiRtmResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub text: *mut c_char,
    pub count: u32,
}

impl FfiRtmResult {
    pub(crate) fn ok_text(text: String, count: u32) -> *mut Self {
        Box::into_raw(Box::new(FfiRtmResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            text: into_c_string(text),
            count,
        }))
    }

    pub(crate) fn failure(error_code: FfiErrorCode, msg: String) -> *mut Self {
        Box::into_raw(Box::new(FfiRtmResult {
            error_code,
            error_message: into_c_string(msg),
            text: std::ptr::null_mut(),
            count: 0,
        }))
    }

    pub(crate) fn from_error(err: RtmError) -> *mut Self {
        let code = match &err {
            RtmError::MissingCredentials(_) => FfiErrorCode::MissingCredentials,
            RtmError::Transport(_) => FfiErrorCode::Transport,
            RtmError::RemoteApi { .. } => FfiErrorCode::RemoteApi,
            RtmError::MalformedResponse(_) => FfiErrorCode::MalformedResponse,
        };
        Self::failure(code, err.to_string())
    }

    pub(crate) fn no_match(line: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NoMatch, format!("no addressable RTM link in {line:?}"))
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg.to_string())
    }
}
