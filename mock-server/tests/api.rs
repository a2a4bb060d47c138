use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, SEED_APPID, SEED_PASSWORD, SEED_USER};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

fn app_uri() -> String {
    format!("/app/{SEED_APPID}/api")
}

async fn call(app: &mut axum::routing::RouterIntoService<String>, req: Request<String>) -> Value {
    use tower::Service;

    let resp = ServiceExt::ready(app).await.unwrap().call(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

// --- ip ---

#[tokio::test]
async fn ip_returns_loopback() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/ip").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["ip"], "127.0.0.1");
}

// --- app api ---

#[tokio::test]
async fn login_returns_session() {
    let body = format!("username={SEED_USER}&password={SEED_PASSWORD}&action=login");
    let resp = app().oneshot(form_request(&app_uri(), &body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["error"], false);
    assert!(json["session"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn unknown_appid_is_in_band_error() {
    let resp = app()
        .oneshot(form_request("/app/other/api", "action=has2fa&username=demo"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["error"], true);
    assert_eq!(json["message"], "Invalid application.");
}

#[tokio::test]
async fn missing_form_body_is_rejected() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(app_uri())
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn get_on_app_api_is_not_allowed() {
    let resp = app()
        .oneshot(Request::builder().uri(app_uri()).body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// --- execute api ---

#[tokio::test]
async fn execute_api_echoes_fields() {
    let resp = app()
        .oneshot(form_request("/executeapi/7", "data=hello+world&time=1700000000"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["id"], "7");
    assert_eq!(json["received"]["data"], "hello world");
    assert_eq!(json["received"]["time"], "1700000000");
    assert!(json["received"].get("session").is_none());
}

// --- full session lifecycle ---

#[tokio::test]
async fn chat_lifecycle() {
    let mut app = app().into_service();

    let login = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("username={SEED_USER}&password={SEED_PASSWORD}&action=login"),
        ),
    )
    .await;
    let session = login["session"].as_str().unwrap().to_string();

    // send
    let sent = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("session={session}&message=first+post&action=send-app-msg"),
        ),
    )
    .await;
    assert_eq!(sent["error"], false);
    let mid = sent["id"].as_str().unwrap().to_string();

    // list
    let chat = call(
        &mut app,
        form_request(&app_uri(), &format!("session={session}&action=get-app-chat")),
    )
    .await;
    let messages = chat["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message"], "first post");
    assert_eq!(messages[0]["author"], SEED_USER);

    // edit without new text only flags the message
    let edited = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("session={session}&mid={mid}&action=edit-app-msg"),
        ),
    )
    .await;
    assert_eq!(edited["error"], false);
    assert_eq!(edited["message"]["edited"], true);
    assert_eq!(edited["message"]["message"], "first post");

    // delete
    let deleted = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("session={session}&mid={mid}&action=del-app-msg"),
        ),
    )
    .await;
    assert_eq!(deleted["error"], false);

    // delete again, already gone
    let again = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("session={session}&mid={mid}&action=del-app-msg"),
        ),
    )
    .await;
    assert_eq!(again["error"], true);

    // list after delete is empty
    let chat = call(
        &mut app,
        form_request(&app_uri(), &format!("session={session}&action=get-app-chat")),
    )
    .await;
    assert!(chat["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn user_vars_and_password_change() {
    let mut app = app().into_service();

    let login = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("username={SEED_USER}&password={SEED_PASSWORD}&action=login"),
        ),
    )
    .await;
    let session = login["session"].as_str().unwrap().to_string();

    let set = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("session={session}&key=level&value=9&action=set-user-vars"),
        ),
    )
    .await;
    assert_eq!(set["error"], false);

    let vars = call(
        &mut app,
        form_request(&app_uri(), &format!("session={session}&action=myvars")),
    )
    .await;
    assert_eq!(vars["vars"]["level"], "9");
    assert_eq!(vars["vars"]["theme"], "dark");

    let wrong = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("session={session}&oldpassword=nope&newpassword=x&action=change-pass"),
        ),
    )
    .await;
    assert_eq!(wrong["error"], true);

    let changed = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!(
                "session={session}&oldpassword={SEED_PASSWORD}&newpassword=s3cret&action=change-pass"
            ),
        ),
    )
    .await;
    assert_eq!(changed["error"], false);

    let old_login = call(
        &mut app,
        form_request(
            &app_uri(),
            &format!("username={SEED_USER}&password={SEED_PASSWORD}&action=login"),
        ),
    )
    .await;
    assert_eq!(old_login["error"], true);
}
