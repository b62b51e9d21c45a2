//! Bridge between markdown checklist lines and Remember The Milk tasks.
//!
//! # Overview
//! Fetches tasks through the signed REST API and renders them as checklist
//! lines carrying an embedded id tag; reads such a line back to complete the
//! remote task, or turns a plain line into a new remote task.
//!
//! # Design
//! - `RtmClient` splits every operation into `build_*` (a signed
//!   `HttpRequest`) and `parse_*` (consumes an `HttpResponse`), so the I/O
//!   boundary is explicit. A `Transport` runs the round-trip in between.
//! - Responses go through `normalize` before anything iterates them; the
//!   service collapses one-element arrays into bare objects.
//! - `markdown` is pure and total; `tasks` and `client` are the only
//!   fallible layers.
//! - Editor, settings storage and notifications are host capabilities
//!   (`host`, `config::SettingsStore`) driven by `commands::Bridge`.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod markdown;
pub mod normalize;
pub mod session;
pub mod signature;
pub mod tasks;

pub use client::RtmClient;
pub use commands::{Bridge, Outcome};
pub use config::{Endpoints, JsonFileStore, Settings, SettingsStore};
pub use error::RtmError;
pub use http::{HttpRequest, HttpResponse, Transport, UreqTransport};
pub use markdown::{decode_line, encode_line, extract_task_name, mark_complete};
pub use normalize::{build_list_map, normalize_to_array, ListMap};
pub use session::Session;
pub use signature::sign;
pub use tasks::{build_tasks, FormattedTask, TaskRef};
