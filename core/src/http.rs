//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `FusionApp` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network; a
//! `Transport` (or a C host, through the FFI crate) performs the round-trip.
//!
//! All fields use owned types (`String`, `Vec`) so values can cross FFI
//! boundaries without lifetime concerns.

use url::form_urlencoded;

/// Content type of every request body sent to FusionAPI.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP method for a request. FusionAPI only uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub(crate) fn get(path: String) -> Self {
        HttpRequest {
            method: HttpMethod::Get,
            path,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST whose body is `fields` form-encoded in the given order.
    pub(crate) fn post_form(path: String, fields: &[(&str, &str)]) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();
        HttpRequest {
            method: HttpMethod::Post,
            path,
            headers: vec![("content-type".to_string(), FORM_CONTENT_TYPE.to_string())],
            body: Some(body),
        }
    }

    /// Decode the form body back into its fields. Empty for bodiless requests.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        match &self.body {
            Some(body) => form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Value of a single form field, if present.
    pub fn form_field(&self, name: &str) -> Option<String> {
        self.form_fields()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_form_encodes_reserved_characters() {
        let req = HttpRequest::post_form(
            "http://x/".to_string(),
            &[("message", "a&b=c d"), ("action", "send-app-msg")],
        );
        assert_eq!(req.body.as_deref(), Some("message=a%26b%3Dc+d&action=send-app-msg"));
        assert_eq!(req.form_field("message").as_deref(), Some("a&b=c d"));
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), FORM_CONTENT_TYPE.to_string())]
        );
    }

    #[test]
    fn get_has_no_form_fields() {
        let req = HttpRequest::get("http://x/api/ip".to_string());
        assert!(req.form_fields().is_empty());
        assert_eq!(req.method.as_str(), "GET");
    }
}
