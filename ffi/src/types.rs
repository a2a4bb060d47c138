//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! enums with explicit discriminants. Response payloads cross as JSON text,
//! since FusionAPI responses have no fixed schema. Conversion functions live
//! here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use fusion_core::error::ApiError;
use fusion_core::http::HttpMethod;
use serde_json::Value;

/// Opaque handle to a `FusionApp`. C callers receive a pointer to this and
/// pass it back into every FFI function.
pub struct FfiFusionApp {
    pub(crate) inner: fusion_core::FusionApp,
}

/// Allocate a C string. Interior NULs cannot come from C input, so the
/// empty-string fallback only guards server-supplied text.
pub(crate) fn to_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `fusion_build_*` functions. `body` is form-encoded text, or null
/// for GET. The C caller executes the request and passes the response back
/// through a `fusion_parse_*` function.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub path: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: fusion_core::HttpRequest) -> *mut Self {
        let path = to_c_string(req.path);
        let body = match req.body {
            Some(b) => to_c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Vec<FfiHeader> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            // Boxed slice so capacity == len when `fusion_free_request`
            // rebuilds the Vec.
            Box::into_raw(ffi_headers.into_boxed_slice()) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            path,
            headers,
            headers_len,
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing a request, then
/// passes a pointer to a `fusion_parse_*` function. The FFI layer reads but
/// does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiFusionResult`.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Transport = 1,
    Http = 2,
    Deserialization = 3,
    MissingField = 4,
    Config = 5,
    Panic = 6,
    NullArg = 7,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null and `data` is
/// the payload: JSON text for response parsers, the bare address for
/// `fusion_parse_client_ip`. `missing` is set only by the variable parsers
/// when the key was absent (`data` then holds the legacy
/// `"Invalid Variable."` JSON string).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, and `data` is null.
#[repr(C)]
pub struct FfiFusionResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub missing: bool,
    pub data: *mut c_char,
}

impl FfiFusionResult {
    fn alloc(result: FfiFusionResult) -> *mut Self {
        Box::into_raw(Box::new(result))
    }

    /// Build a success result carrying JSON text.
    pub(crate) fn ok_json(json: &Value) -> *mut Self {
        Self::ok_text(json.to_string(), false)
    }

    /// Build a success result for a variable lookup.
    pub(crate) fn ok_var(lookup: fusion_core::VarLookup) -> *mut Self {
        let missing = lookup == fusion_core::VarLookup::Missing;
        Self::ok_text(lookup.into_legacy().to_string(), missing)
    }

    pub(crate) fn ok_text(text: String, missing: bool) -> *mut Self {
        Self::alloc(FfiFusionResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            missing,
            data: to_c_string(text),
        })
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let (error_code, http_status) = match &err {
            ApiError::Transport(_) => (FfiErrorCode::Transport, 0),
            ApiError::HttpError { status, .. } => (FfiErrorCode::Http, *status),
            ApiError::DeserializationError(_) => (FfiErrorCode::Deserialization, 0),
            ApiError::MissingField(_) => (FfiErrorCode::MissingField, 0),
            ApiError::Config(_) => (FfiErrorCode::Config, 0),
        };
        Self::failure(error_code, http_status, err.to_string())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, 0, format!("null argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, 0, msg.to_string())
    }

    fn failure(error_code: FfiErrorCode, http_status: u16, msg: String) -> *mut Self {
        Self::alloc(FfiFusionResult {
            error_code,
            error_message: to_c_string(msg),
            http_status,
            missing: false,
            data: std::ptr::null_mut(),
        })
    }
}
