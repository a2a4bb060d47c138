//! C-ABI wrapper around `fusion-core`.
//!
//! # Overview
//! Exposes the FusionAPI client through `extern "C"` functions so any
//! language with a C FFI can build requests and parse responses while doing
//! the HTTP round-trip with its own stack.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `fusion_build_*` mirrors the core builders 1:1. Parsers follow the core:
//!   one shared `fusion_parse_response` for pass-through operations, plus
//!   dedicated parsers for login, the blob fetches and variable lookups.
//! - Parsers that update session state take `*mut FfiFusionApp`.
//! - The C caller owns all returned pointers and must call the matching
//!   `fusion_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use fusion_core::http::{HttpRequest, HttpResponse};
use fusion_core::FusionApp;

use types::*;

/// Borrow a C string as `&str`. `None` for null or invalid UTF-8.
fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Shared body of every `fusion_build_*` function: resolve the handle and
/// string arguments, then run the core builder.
fn build_with<F>(app: *const FfiFusionApp, args: &[*const c_char], build: F) -> *mut FfiHttpRequest
where
    F: FnOnce(&FusionApp, &[&str]) -> HttpRequest,
{
    catch_unwind(AssertUnwindSafe(|| {
        if app.is_null() {
            return std::ptr::null_mut();
        }
        let app = unsafe { &*app };
        let Some(args) = args.iter().map(|&p| c_str(p)).collect::<Option<Vec<&str>>>() else {
            return std::ptr::null_mut();
        };
        FfiHttpRequest::from_core(build(&app.inner, &args))
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a logged-out `FusionApp` for `appid` on the server at `base_url`.
///
/// Returns null if either argument is null or not UTF-8, or if an internal
/// panic occurs. The caller must free the returned pointer with
/// `fusion_app_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_app_new(base_url: *const c_char, appid: *const c_char) -> *mut FfiFusionApp {
    catch_unwind(|| {
        let (Some(url), Some(appid)) = (c_str(base_url), c_str(appid)) else {
            return std::ptr::null_mut();
        };
        let app = FusionApp::new(url, appid);
        Box::into_raw(Box::new(FfiFusionApp { inner: app }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `FusionApp` created by `fusion_app_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_app_free(app: *mut FfiFusionApp) {
    if !app.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(app) });
        });
    }
}

// ---------------------------------------------------------------------------
// State accessors
// ---------------------------------------------------------------------------

fn read_state<F>(app: *const FfiFusionApp, read: F) -> *mut c_char
where
    F: FnOnce(&FusionApp) -> Option<String>,
{
    catch_unwind(AssertUnwindSafe(|| {
        if app.is_null() {
            return std::ptr::null_mut();
        }
        let app = unsafe { &*app };
        match read(&app.inner) {
            Some(s) => to_c_string(s),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// The session token, or null while logged out. Free with `fusion_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_app_session(app: *const FfiFusionApp) -> *mut c_char {
    read_state(app, |a| a.session().token().map(str::to_string))
}

/// The logged-in username (empty before login). Free with `fusion_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_app_username(app: *const FfiFusionApp) -> *mut c_char {
    read_state(app, |a| Some(a.username().to_string()))
}

/// The cached app blob as JSON text, or null if none was fetched.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_app_cache(app: *const FfiFusionApp) -> *mut c_char {
    read_state(app, |a| a.app_cache().map(|v| v.to_string()))
}

/// The cached user blob as JSON text, or null if none was fetched.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_user_cache(app: *const FfiFusionApp) -> *mut c_char {
    read_state(app, |a| a.user_cache().map(|v| v.to_string()))
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------
//
// All return null if `app` or any string argument is null or not UTF-8.
// The caller must free the returned pointer with `fusion_free_request`.

/// Build the `GET {base_url}api/ip` request. Needs no client handle.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_client_ip(base_url: *const c_char) -> *mut FfiHttpRequest {
    catch_unwind(|| match c_str(base_url) {
        Some(url) => FfiHttpRequest::from_core(fusion_core::build_client_ip(url)),
        None => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_login(
    app: *const FfiFusionApp,
    username: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[username, password], |a, s| a.build_login(s[0], s[1]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_check_2fa(
    app: *const FfiFusionApp,
    username: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[username], |a, s| a.build_check_2fa(s[0]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_register(
    app: *const FfiFusionApp,
    username: *const c_char,
    password: *const c_char,
    token: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[username, password, token], |a, s| {
        a.build_register(s[0], s[1], s[2])
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_change_password(
    app: *const FfiFusionApp,
    old: *const c_char,
    new: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[old, new], |a, s| a.build_change_password(s[0], s[1]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_app_blob(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_app_blob())
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_user_blob(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_user_blob())
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_get_user_vars(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_get_user_vars())
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_get_app_vars(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_get_app_vars())
}

/// Same request as `fusion_build_get_app_vars`; pair with `fusion_parse_app_var`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_get_app_var(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_get_app_var())
}

/// Same request as `fusion_build_get_user_vars`; pair with `fusion_parse_user_var`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_get_user_var(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_get_user_var())
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_set_user_var(
    app: *const FfiFusionApp,
    key: *const c_char,
    value: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[key, value], |a, s| a.build_set_user_var(s[0], s[1]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_get_app_chat(app: *const FfiFusionApp) -> *mut FfiHttpRequest {
    build_with(app, &[], |a, _| a.build_get_app_chat())
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_delete_app_message(
    app: *const FfiFusionApp,
    message_id: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[message_id], |a, s| a.build_delete_app_message(s[0]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_edit_app_message(
    app: *const FfiFusionApp,
    message_id: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[message_id], |a, s| a.build_edit_app_message(s[0]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_send_app_message(
    app: *const FfiFusionApp,
    content: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[content], |a, s| a.build_send_app_message(s[0]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_execute_api(
    app: *const FfiFusionApp,
    id: *const c_char,
    data: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[id, data], |a, s| a.build_execute_api(s[0], s[1]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_execute_auth_api(
    app: *const FfiFusionApp,
    id: *const c_char,
    data: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[id, data], |a, s| a.build_execute_auth_api(s[0], s[1]))
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_execute_time_api(
    app: *const FfiFusionApp,
    id: *const c_char,
    data: *const c_char,
    time: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[id, data, time], |a, s| {
        a.build_execute_time_api(s[0], s[1], s[2])
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fusion_build_execute_full_api(
    app: *const FfiFusionApp,
    id: *const c_char,
    data: *const c_char,
    time: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(app, &[id, data, time], |a, s| {
        a.build_execute_full_api(s[0], s[1], s[2])
    })
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`. A null body is
/// read as empty.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    HttpResponse {
        status: resp.status,
        headers: Vec::new(),
        body: c_str(resp.body).unwrap_or("").to_string(),
    }
}

/// Parse the response of any pass-through operation (everything except
/// login, the blob fetches and single-variable lookups).
///
/// Returns the response JSON in `data`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_response(
    app: *const FfiFusionApp,
    response: *const FfiHttpResponse,
) -> *mut FfiFusionResult {
    catch_unwind(|| {
        if app.is_null() {
            return FfiFusionResult::null_arg("app");
        }
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let app = unsafe { &*app };
        let resp = unsafe { &*response };
        match app.inner.parse_response(ffi_response_to_core(resp)) {
            Ok(json) => FfiFusionResult::ok_json(&json),
            Err(e) => FfiFusionResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_response"))
}

/// Parse a login response. On success the handle's session and username are
/// updated; `username` must be the one passed to `fusion_build_login`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_login(
    app: *mut FfiFusionApp,
    username: *const c_char,
    response: *const FfiHttpResponse,
) -> *mut FfiFusionResult {
    catch_unwind(AssertUnwindSafe(|| {
        if app.is_null() {
            return FfiFusionResult::null_arg("app");
        }
        let Some(username) = c_str(username) else {
            return FfiFusionResult::null_arg("username");
        };
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let app = unsafe { &mut *app };
        let resp = unsafe { &*response };
        match app.inner.parse_login(username, ffi_response_to_core(resp)) {
            Ok(json) => FfiFusionResult::ok_json(&json),
            Err(e) => FfiFusionResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_login"))
}

/// Parse an `appblob` response, caching the blob on success.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_app_blob(
    app: *mut FfiFusionApp,
    response: *const FfiHttpResponse,
) -> *mut FfiFusionResult {
    catch_unwind(AssertUnwindSafe(|| {
        if app.is_null() {
            return FfiFusionResult::null_arg("app");
        }
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let app = unsafe { &mut *app };
        let resp = unsafe { &*response };
        match app.inner.parse_app_blob(ffi_response_to_core(resp)) {
            Ok(json) => FfiFusionResult::ok_json(&json),
            Err(e) => FfiFusionResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_app_blob"))
}

/// Parse a `myblob` response, caching the blob on success.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_user_blob(
    app: *mut FfiFusionApp,
    response: *const FfiHttpResponse,
) -> *mut FfiFusionResult {
    catch_unwind(AssertUnwindSafe(|| {
        if app.is_null() {
            return FfiFusionResult::null_arg("app");
        }
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let app = unsafe { &mut *app };
        let resp = unsafe { &*response };
        match app.inner.parse_user_blob(ffi_response_to_core(resp)) {
            Ok(json) => FfiFusionResult::ok_json(&json),
            Err(e) => FfiFusionResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_user_blob"))
}

/// Pick `var` out of an app-vars response. `data` is the value as JSON;
/// when absent, `missing` is set and `data` is `"Invalid Variable."`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_app_var(
    app: *const FfiFusionApp,
    var: *const c_char,
    response: *const FfiHttpResponse,
) -> *mut FfiFusionResult {
    catch_unwind(|| {
        if app.is_null() {
            return FfiFusionResult::null_arg("app");
        }
        let Some(var) = c_str(var) else {
            return FfiFusionResult::null_arg("var");
        };
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let app = unsafe { &*app };
        let resp = unsafe { &*response };
        match app.inner.parse_app_var(var, ffi_response_to_core(resp)) {
            Ok(lookup) => FfiFusionResult::ok_var(lookup),
            Err(e) => FfiFusionResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_app_var"))
}

/// Pick `var` out of a user-vars response. Same conventions as
/// `fusion_parse_app_var`.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_user_var(
    app: *const FfiFusionApp,
    var: *const c_char,
    response: *const FfiHttpResponse,
) -> *mut FfiFusionResult {
    catch_unwind(|| {
        if app.is_null() {
            return FfiFusionResult::null_arg("app");
        }
        let Some(var) = c_str(var) else {
            return FfiFusionResult::null_arg("var");
        };
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let app = unsafe { &*app };
        let resp = unsafe { &*response };
        match app.inner.parse_user_var(var, ffi_response_to_core(resp)) {
            Ok(lookup) => FfiFusionResult::ok_var(lookup),
            Err(e) => FfiFusionResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_user_var"))
}

/// Parse an `api/ip` response. `data` is the bare address, not JSON.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_parse_client_ip(response: *const FfiHttpResponse) -> *mut FfiFusionResult {
    catch_unwind(|| {
        if response.is_null() {
            return FfiFusionResult::null_arg("response");
        }
        let resp = unsafe { &*response };
        match fusion_core::parse_client_ip(ffi_response_to_core(resp)) {
            Ok(ip) => FfiFusionResult::ok_text(ip, false),
            Err(e) => FfiFusionResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFusionResult::panic("panic in fusion_parse_client_ip"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `fusion_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.path.is_null() {
            drop(unsafe { CString::from_raw(req.path) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers: Box<[FfiHeader]> = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    });
}

/// Free an `FfiFusionResult` returned by any `fusion_parse_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_free_result(result: *mut FfiFusionResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.data.is_null() {
            drop(unsafe { CString::from_raw(result.data) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fusion_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
