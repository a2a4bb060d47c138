//! Domain types for the FusionAPI client.
//!
//! # Design
//! Server payloads are arbitrary JSON, so responses stay `serde_json::Value`.
//! The types here cover what the client itself interprets: the session
//! state, the `action` names of the app-scoped endpoint, and the result of
//! looking up a single variable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel the server receives as `session` before a successful login.
pub const LOGGED_OUT_SESSION: &str = "NOT_LOGGED_IN";

/// Value returned by the single-variable getters when the key is absent.
pub const INVALID_VARIABLE: &str = "Invalid Variable.";

/// Authentication state of a `FusionApp`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    LoggedOut,
    Active(String),
}

impl Session {
    /// The string sent in the `session` form field.
    pub fn wire_value(&self) -> &str {
        match self {
            Session::LoggedOut => LOGGED_OUT_SESSION,
            Session::Active(token) => token,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::LoggedOut => None,
            Session::Active(token) => Some(token),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Session::Active(_))
    }
}

/// `action` values understood by `POST /app/{appid}/api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Login,
    #[serde(rename = "has2fa")]
    Has2fa,
    Register,
    #[serde(rename = "appblob")]
    AppBlob,
    #[serde(rename = "myvars")]
    MyVars,
    GetAppVars,
    SetUserVars,
    ChangePass,
    #[serde(rename = "myblob")]
    MyBlob,
    GetAppChat,
    DelAppMsg,
    EditAppMsg,
    SendAppMsg,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::Login,
        Action::Has2fa,
        Action::Register,
        Action::AppBlob,
        Action::MyVars,
        Action::GetAppVars,
        Action::SetUserVars,
        Action::ChangePass,
        Action::MyBlob,
        Action::GetAppChat,
        Action::DelAppMsg,
        Action::EditAppMsg,
        Action::SendAppMsg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::Has2fa => "has2fa",
            Action::Register => "register",
            Action::AppBlob => "appblob",
            Action::MyVars => "myvars",
            Action::GetAppVars => "get-app-vars",
            Action::SetUserVars => "set-user-vars",
            Action::ChangePass => "change-pass",
            Action::MyBlob => "myblob",
            Action::GetAppChat => "get-app-chat",
            Action::DelAppMsg => "del-app-msg",
            Action::EditAppMsg => "edit-app-msg",
            Action::SendAppMsg => "send-app-msg",
        }
    }

    pub fn from_wire(s: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// Result of looking up one key in a response's `vars` object.
#[derive(Debug, Clone, PartialEq)]
pub enum VarLookup {
    Found(Value),
    Missing,
}

impl VarLookup {
    /// Look up `response["vars"][var]`. A missing or non-object `vars` is
    /// treated the same as a missing key.
    pub fn from_response(response: &Value, var: &str) -> Self {
        match response.get("vars").and_then(|vars| vars.get(var)) {
            Some(value) => VarLookup::Found(value.clone()),
            None => VarLookup::Missing,
        }
    }

    /// Collapse into the value legacy callers expect, with the
    /// `"Invalid Variable."` string standing in for a missing key.
    pub fn into_legacy(self) -> Value {
        match self {
            VarLookup::Found(value) => value,
            VarLookup::Missing => Value::String(INVALID_VARIABLE.to_string()),
        }
    }

    pub fn found(self) -> Option<Value> {
        match self {
            VarLookup::Found(value) => Some(value),
            VarLookup::Missing => None,
        }
    }
}

/// Whether a response reports success: its `error` field is present and
/// falsy (`false`, `null`, `0`, `""`, `[]` or `{}`).
pub fn reports_success(response: &Value) -> bool {
    match response.get("error") {
        None => false,
        Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}
