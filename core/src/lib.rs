//! Blocking client for the FusionAPI authentication and app-state service.
//!
//! # Overview
//! `FusionApp` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network (host-does-IO pattern), while holding the
//! per-application session: token, username and the cached app/user blobs.
//! `FusionClient` pairs it with a `Transport` for one-call-per-operation use.
//!
//! # Design
//! - Responses stay `serde_json::Value`; FusionAPI reports errors in-band
//!   through an `error` field, and only login and blob fetches act on it.
//! - The logged-out state is `Session::LoggedOut`; the `NOT_LOGGED_IN`
//!   string only exists on the wire.
//! - Types use owned `String` / `Vec` fields to simplify FFI mapping.

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use blocking::{client_ip, client_ip_with, FusionClient};
pub use client::{build_client_ip, parse_client_ip, FusionApp};
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{Action, Session, VarLookup, INVALID_VARIABLE, LOGGED_OUT_SESSION};
