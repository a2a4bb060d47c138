//! Request builder and response parser for the FusionAPI service.
//!
//! # Design
//! `FusionApp` holds the per-application session state (token, username and
//! the two cached blobs) but never touches the network. Each operation is
//! split into a `build_*` method that produces an `HttpRequest` and a
//! `parse_*` method that consumes the `HttpResponse`. Operations whose result
//! is passed through untouched share `parse_response`; only login and the two
//! blob fetches mutate state, so only their parsers take `&mut self`.

use serde_json::Value;
use tracing::debug;

use crate::config::normalize_base_url;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{reports_success, Action, Session, VarLookup};

/// Session state and protocol for one application on a FusionAPI server.
#[derive(Debug, Clone)]
pub struct FusionApp {
    base_url: String,
    appid: String,
    session: Session,
    username: String,
    app_cache: Option<Value>,
    user_cache: Option<Value>,
}

impl FusionApp {
    /// A logged-out client for `appid`. No request is made.
    pub fn new(base_url: &str, appid: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            appid: appid.to_string(),
            session: Session::LoggedOut,
            username: String::new(),
            app_cache: None,
            user_cache: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn appid(&self) -> &str {
        &self.appid
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Empty until a login succeeds.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_active()
    }

    /// Blob from the last successful `appblob` fetch.
    pub fn app_cache(&self) -> Option<&Value> {
        self.app_cache.as_ref()
    }

    /// Blob from the last successful `myblob` fetch.
    pub fn user_cache(&self) -> Option<&Value> {
        self.user_cache.as_ref()
    }

    fn app_endpoint(&self) -> String {
        format!("{}app/{}/api", self.base_url, self.appid)
    }

    fn execute_endpoint(&self, id: &str) -> String {
        format!("{}executeapi/{id}", self.base_url)
    }

    fn app_request(&self, action: Action, fields: &[(&str, &str)]) -> HttpRequest {
        let mut form = fields.to_vec();
        form.push(("action", action.as_str()));
        debug!(appid = %self.appid, action = action.as_str(), "building app request");
        HttpRequest::post_form(self.app_endpoint(), &form)
    }

    fn session_request(&self, action: Action, fields: &[(&str, &str)]) -> HttpRequest {
        let mut form = vec![("session", self.session.wire_value())];
        form.extend_from_slice(fields);
        self.app_request(action, &form)
    }

    fn execute_request(&self, id: &str, fields: &[(&str, &str)]) -> HttpRequest {
        debug!(id, fields = fields.len(), "building execute-api request");
        HttpRequest::post_form(self.execute_endpoint(id), fields)
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        self.app_request(Action::Login, &[("username", username), ("password", password)])
    }

    pub fn build_check_2fa(&self, username: &str) -> HttpRequest {
        self.app_request(Action::Has2fa, &[("username", username)])
    }

    pub fn build_register(&self, username: &str, password: &str, token: &str) -> HttpRequest {
        self.app_request(
            Action::Register,
            &[("username", username), ("password", password), ("token", token)],
        )
    }

    pub fn build_change_password(&self, old: &str, new: &str) -> HttpRequest {
        self.session_request(
            Action::ChangePass,
            &[("oldpassword", old), ("newpassword", new)],
        )
    }

    /// Parse a login response. On success the server token becomes the
    /// session and `username` is remembered; otherwise state is untouched.
    pub fn parse_login(&mut self, username: &str, response: HttpResponse) -> Result<Value, ApiError> {
        let json = parse_json(response)?;
        if reports_success(&json) {
            let token = json
                .get("session")
                .and_then(Value::as_str)
                .ok_or(ApiError::MissingField("session"))?;
            self.session = Session::Active(token.to_string());
            self.username = username.to_string();
            debug!(appid = %self.appid, username, "login accepted");
        }
        Ok(json)
    }

    // -----------------------------------------------------------------------
    // Blobs and variables
    // -----------------------------------------------------------------------

    pub fn build_app_blob(&self) -> HttpRequest {
        self.session_request(Action::AppBlob, &[])
    }

    pub fn build_user_blob(&self) -> HttpRequest {
        self.session_request(Action::MyBlob, &[])
    }

    pub fn parse_app_blob(&mut self, response: HttpResponse) -> Result<Value, ApiError> {
        let json = parse_json(response)?;
        if let Some(blob) = successful_blob(&json)? {
            debug!(appid = %self.appid, "app blob cached");
            self.app_cache = Some(blob);
        }
        Ok(json)
    }

    pub fn parse_user_blob(&mut self, response: HttpResponse) -> Result<Value, ApiError> {
        let json = parse_json(response)?;
        if let Some(blob) = successful_blob(&json)? {
            debug!(appid = %self.appid, "user blob cached");
            self.user_cache = Some(blob);
        }
        Ok(json)
    }

    pub fn build_get_user_vars(&self) -> HttpRequest {
        self.session_request(Action::MyVars, &[])
    }

    pub fn build_get_app_vars(&self) -> HttpRequest {
        self.session_request(Action::GetAppVars, &[])
    }

    /// FusionAPI has no single-variable fetch; this is the full app-vars
    /// request and `parse_app_var` picks the key out.
    pub fn build_get_app_var(&self) -> HttpRequest {
        self.build_get_app_vars()
    }

    /// Same request as `build_get_user_vars`.
    pub fn build_get_user_var(&self) -> HttpRequest {
        self.build_get_user_vars()
    }

    pub fn parse_app_var(&self, var: &str, response: HttpResponse) -> Result<VarLookup, ApiError> {
        let json = parse_json(response)?;
        Ok(VarLookup::from_response(&json, var))
    }

    pub fn parse_user_var(&self, var: &str, response: HttpResponse) -> Result<VarLookup, ApiError> {
        let json = parse_json(response)?;
        Ok(VarLookup::from_response(&json, var))
    }

    pub fn build_set_user_var(&self, key: &str, value: &str) -> HttpRequest {
        self.session_request(Action::SetUserVars, &[("key", key), ("value", value)])
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub fn build_get_app_chat(&self) -> HttpRequest {
        self.session_request(Action::GetAppChat, &[])
    }

    pub fn build_delete_app_message(&self, message_id: &str) -> HttpRequest {
        self.session_request(Action::DelAppMsg, &[("mid", message_id)])
    }

    pub fn build_edit_app_message(&self, message_id: &str) -> HttpRequest {
        self.session_request(Action::EditAppMsg, &[("mid", message_id)])
    }

    pub fn build_send_app_message(&self, content: &str) -> HttpRequest {
        self.session_request(Action::SendAppMsg, &[("message", content)])
    }

    // -----------------------------------------------------------------------
    // Execute-API
    // -----------------------------------------------------------------------

    pub fn build_execute_api(&self, id: &str, data: &str) -> HttpRequest {
        self.execute_request(id, &[("data", data)])
    }

    pub fn build_execute_auth_api(&self, id: &str, data: &str) -> HttpRequest {
        self.execute_request(id, &[("data", data), ("session", self.session.wire_value())])
    }

    pub fn build_execute_time_api(&self, id: &str, data: &str, time: &str) -> HttpRequest {
        self.execute_request(id, &[("data", data), ("time", time)])
    }

    pub fn build_execute_full_api(&self, id: &str, data: &str, time: &str) -> HttpRequest {
        self.execute_request(
            id,
            &[("data", data), ("time", time), ("session", self.session.wire_value())],
        )
    }

    /// Parse any response that is handed back unmodified: everything except
    /// login, the blob fetches and the single-variable getters.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_json(response)
    }
}

/// Build the `GET {base}api/ip` request.
pub fn build_client_ip(base_url: &str) -> HttpRequest {
    HttpRequest::get(format!("{}api/ip", normalize_base_url(base_url)))
}

/// Extract the `ip` string from an `api/ip` response.
pub fn parse_client_ip(response: HttpResponse) -> Result<String, ApiError> {
    let json = parse_json(response)?;
    json.get("ip")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ApiError::MissingField("ip"))
}

/// Decode a JSON body whatever the status: FusionAPI reports failures in-band.
fn parse_json(response: HttpResponse) -> Result<Value, ApiError> {
    match serde_json::from_str(&response.body) {
        Ok(json) => Ok(json),
        Err(_) if !response.is_success() => Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        }),
        Err(e) => Err(ApiError::DeserializationError(e.to_string())),
    }
}

fn successful_blob(json: &Value) -> Result<Option<Value>, ApiError> {
    if !reports_success(json) {
        return Ok(None);
    }
    json.get("blob")
        .cloned()
        .map(Some)
        .ok_or(ApiError::MissingField("blob"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use serde_json::json;

    fn app() -> FusionApp {
        FusionApp::new("http://localhost:3000", "demo-app")
    }

    fn ok(body: Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn fields(req: &HttpRequest) -> Vec<(String, String)> {
        req.form_fields()
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn logged_in() -> FusionApp {
        let mut app = app();
        app.parse_login("u", ok(json!({"error": false, "session": "abc123"})))
            .unwrap();
        app
    }

    #[test]
    fn new_app_is_logged_out() {
        let app = app();
        assert_eq!(app.session(), &Session::LoggedOut);
        assert_eq!(app.username(), "");
        assert!(app.app_cache().is_none());
        assert!(app.user_cache().is_none());
        assert!(!app.is_logged_in());
        assert_eq!(app.appid(), "demo-app");
    }

    #[test]
    fn build_login_posts_form_to_app_endpoint() {
        let req = app().build_login("u", "p");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/app/demo-app/api");
        assert_eq!(
            fields(&req),
            pairs(&[("username", "u"), ("password", "p"), ("action", "login")])
        );
    }

    #[test]
    fn login_success_sets_session_and_username() {
        let app = logged_in();
        assert_eq!(app.session(), &Session::Active("abc123".to_string()));
        assert_eq!(app.username(), "u");
    }

    #[test]
    fn login_error_leaves_state_unchanged() {
        let mut app = app();
        let json = app.parse_login("u", ok(json!({"error": true}))).unwrap();
        assert_eq!(json, json!({"error": true}));
        assert_eq!(app.session(), &Session::LoggedOut);
        assert_eq!(app.username(), "");
    }

    #[test]
    fn login_success_without_session_is_missing_field() {
        let mut app = app();
        let err = app.parse_login("u", ok(json!({"error": false}))).unwrap_err();
        assert!(matches!(err, ApiError::MissingField("session")));
        assert!(!app.is_logged_in());
    }

    #[test]
    fn logged_out_requests_send_sentinel_session() {
        let req = app().build_get_app_vars();
        assert_eq!(
            fields(&req),
            pairs(&[("session", "NOT_LOGGED_IN"), ("action", "get-app-vars")])
        );
    }

    #[test]
    fn session_requests_carry_token_after_login() {
        let app = logged_in();
        assert_eq!(
            fields(&app.build_set_user_var("k", "v")),
            pairs(&[("session", "abc123"), ("key", "k"), ("value", "v"), ("action", "set-user-vars")])
        );
        assert_eq!(
            fields(&app.build_change_password("old", "new")),
            pairs(&[
                ("session", "abc123"),
                ("oldpassword", "old"),
                ("newpassword", "new"),
                ("action", "change-pass"),
            ])
        );
    }

    #[test]
    fn single_var_getters_reuse_bulk_actions() {
        let app = app();
        assert_eq!(app.build_get_app_var(), app.build_get_app_vars());
        assert_eq!(app.build_get_user_var(), app.build_get_user_vars());
        assert_eq!(
            app.build_get_user_var().form_field("action").as_deref(),
            Some("myvars")
        );
    }

    #[test]
    fn parse_app_var_found_and_missing() {
        let app = app();
        let body = json!({"error": false, "vars": {"score": 42}});
        let found = app.parse_app_var("score", ok(body.clone())).unwrap();
        assert_eq!(found.into_legacy(), json!(42));
        let missing = app.parse_app_var("missing", ok(body)).unwrap();
        assert_eq!(missing.into_legacy(), json!("Invalid Variable."));
    }

    #[test]
    fn app_blob_success_caches_blob() {
        let mut app = app();
        let body = json!({"error": false, "blob": "XYZ"});
        let json = app.parse_app_blob(ok(body.clone())).unwrap();
        assert_eq!(json, body);
        assert_eq!(app.app_cache(), Some(&json!("XYZ")));
        assert!(app.user_cache().is_none());
    }

    #[test]
    fn user_blob_error_keeps_previous_cache() {
        let mut app = app();
        app.parse_user_blob(ok(json!({"error": false, "blob": {"level": 3}})))
            .unwrap();
        app.parse_user_blob(ok(json!({"error": true, "message": "bad session"})))
            .unwrap();
        assert_eq!(app.user_cache(), Some(&json!({"level": 3})));
    }

    #[test]
    fn chat_requests_use_documented_fields() {
        let app = app();
        assert_eq!(
            fields(&app.build_delete_app_message("m1")),
            pairs(&[("session", "NOT_LOGGED_IN"), ("mid", "m1"), ("action", "del-app-msg")])
        );
        assert_eq!(
            fields(&app.build_edit_app_message("m1")),
            pairs(&[("session", "NOT_LOGGED_IN"), ("mid", "m1"), ("action", "edit-app-msg")])
        );
        assert_eq!(
            fields(&app.build_send_app_message("hi there")),
            pairs(&[("session", "NOT_LOGGED_IN"), ("message", "hi there"), ("action", "send-app-msg")])
        );
    }

    #[test]
    fn execute_family_sends_exact_field_subsets() {
        let app = logged_in();
        let req = app.build_execute_api("42", "payload");
        assert_eq!(req.path, "http://localhost:3000/executeapi/42");
        assert_eq!(fields(&req), pairs(&[("data", "payload")]));
        assert_eq!(
            fields(&app.build_execute_auth_api("42", "payload")),
            pairs(&[("data", "payload"), ("session", "abc123")])
        );
        assert_eq!(
            fields(&app.build_execute_time_api("42", "payload", "1700000000")),
            pairs(&[("data", "payload"), ("time", "1700000000")])
        );
        assert_eq!(
            fields(&app.build_execute_full_api("42", "payload", "1700000000")),
            pairs(&[("data", "payload"), ("time", "1700000000"), ("session", "abc123")])
        );
    }

    #[test]
    fn parse_response_passes_error_payload_through() {
        let body = json!({"error": true, "message": "no such api"});
        assert_eq!(app().parse_response(ok(body.clone())).unwrap(), body);
    }

    #[test]
    fn parse_response_non_json_is_deserialization_error() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "<html>".to_string(),
        };
        let err = app().parse_response(response).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn parse_response_non_json_error_status_is_http_error() {
        let response = HttpResponse {
            status: 502,
            headers: Vec::new(),
            body: "bad gateway".to_string(),
        };
        let err = app().parse_response(response).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 502, .. }));
    }

    #[test]
    fn client_ip_request_and_parse() {
        let req = build_client_ip("https://fusionapi.dev");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "https://fusionapi.dev/api/ip");
        assert!(req.body.is_none());
        assert_eq!(parse_client_ip(ok(json!({"ip": "1.2.3.4"}))).unwrap(), "1.2.3.4");
        assert!(matches!(
            parse_client_ip(ok(json!({}))).unwrap_err(),
            ApiError::MissingField("ip")
        ));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let app = FusionApp::new("http://localhost:3000///", "a");
        assert_eq!(app.build_check_2fa("u").path, "http://localhost:3000/app/a/api");
    }
}
