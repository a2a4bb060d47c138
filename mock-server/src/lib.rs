use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const SEED_APPID: &str = "demo-app";
pub const SEED_USER: &str = "demo";
pub const SEED_PASSWORD: &str = "hunter2";
pub const SEED_2FA_USER: &str = "guarded";
pub const SEED_INVITE: &str = "INVITE-1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub author: String,
    pub message: String,
    #[serde(default)]
    pub edited: bool,
}

#[derive(Clone, Debug)]
pub struct User {
    pub password: String,
    pub has_2fa: bool,
    pub vars: Map<String, Value>,
    pub blob: Value,
}

impl User {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            has_2fa: false,
            vars: Map::new(),
            blob: Value::String(String::new()),
        }
    }
}

/// In-memory state of one FusionAPI application.
#[derive(Debug, Default)]
pub struct Backend {
    pub appid: String,
    pub users: HashMap<String, User>,
    pub sessions: HashMap<String, String>,
    pub invites: HashSet<String>,
    pub app_vars: Map<String, Value>,
    pub app_blob: Value,
    pub chat: Vec<ChatMessage>,
}

type Fields = HashMap<String, String>;
type Outcome = Result<Value, String>;

impl Backend {
    pub fn new(appid: &str) -> Self {
        Self {
            appid: appid.to_string(),
            app_blob: Value::String(String::new()),
            ..Self::default()
        }
    }

    /// Deterministic fixtures: one plain user, one 2FA user, one invite,
    /// a couple of app variables and blobs.
    pub fn seeded(appid: &str) -> Self {
        let mut backend = Self::new(appid);

        let mut demo = User::new(SEED_PASSWORD);
        demo.vars.insert("theme".to_string(), json!("dark"));
        demo.blob = json!("demo-user-blob");
        backend.users.insert(SEED_USER.to_string(), demo);

        let mut guarded = User::new(SEED_PASSWORD);
        guarded.has_2fa = true;
        backend.users.insert(SEED_2FA_USER.to_string(), guarded);

        backend.invites.insert(SEED_INVITE.to_string());
        backend.app_vars.insert("score".to_string(), json!(42));
        backend.app_vars.insert("motd".to_string(), json!("welcome"));
        backend.app_blob = json!("demo-app-blob");
        backend
    }

    /// Dispatch one `POST /app/{appid}/api` form.
    pub fn handle(&mut self, form: &Fields) -> Value {
        let action = form.get("action").map(String::as_str).unwrap_or("");
        let outcome = match action {
            "login" => self.login(form),
            "has2fa" => self.has_2fa(form),
            "register" => self.register(form),
            "appblob" => self.session_user(form).map(|_| json!({"error": false, "blob": self.app_blob})),
            "myvars" => self.user_vars(form),
            "get-app-vars" => self
                .session_user(form)
                .map(|_| json!({"error": false, "vars": self.app_vars})),
            "set-user-vars" => self.set_user_var(form),
            "change-pass" => self.change_password(form),
            "myblob" => self.user_blob(form),
            "get-app-chat" => self
                .session_user(form)
                .map(|_| json!({"error": false, "messages": self.chat})),
            "del-app-msg" => self.delete_message(form),
            "edit-app-msg" => self.edit_message(form),
            "send-app-msg" => self.send_message(form),
            _ => Err("Unknown action.".to_string()),
        };
        outcome.unwrap_or_else(|message| failure(&message))
    }

    fn session_user(&self, form: &Fields) -> Result<String, String> {
        let session = field(form, "session")?;
        self.sessions
            .get(session)
            .cloned()
            .ok_or_else(|| "Invalid session.".to_string())
    }

    fn user_mut(&mut self, form: &Fields) -> Result<&mut User, String> {
        let username = self.session_user(form)?;
        self.users
            .get_mut(&username)
            .ok_or_else(|| "Invalid session.".to_string())
    }

    fn login(&mut self, form: &Fields) -> Outcome {
        let username = field(form, "username")?;
        let password = field(form, "password")?;
        let user = self
            .users
            .get(username)
            .filter(|u| u.password == password)
            .ok_or_else(|| "Invalid username or password.".to_string())?;
        if user.has_2fa {
            return Err("Two factor authentication required.".to_string());
        }
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), username.to_string());
        Ok(json!({"error": false, "session": token, "username": username}))
    }

    fn has_2fa(&self, form: &Fields) -> Outcome {
        let username = field(form, "username")?;
        let user = self
            .users
            .get(username)
            .ok_or_else(|| "User not found.".to_string())?;
        Ok(json!({"error": false, "has2fa": user.has_2fa}))
    }

    fn register(&mut self, form: &Fields) -> Outcome {
        let username = field(form, "username")?;
        let password = field(form, "password")?;
        let token = field(form, "token")?;
        if self.users.contains_key(username) {
            return Err("Username taken.".to_string());
        }
        if !self.invites.remove(token) {
            return Err("Invalid token.".to_string());
        }
        self.users.insert(username.to_string(), User::new(password));
        Ok(json!({"error": false, "message": "Registered."}))
    }

    fn user_vars(&mut self, form: &Fields) -> Outcome {
        let user = self.user_mut(form)?;
        Ok(json!({"error": false, "vars": user.vars}))
    }

    fn user_blob(&mut self, form: &Fields) -> Outcome {
        let user = self.user_mut(form)?;
        Ok(json!({"error": false, "blob": user.blob}))
    }

    fn set_user_var(&mut self, form: &Fields) -> Outcome {
        let key = field(form, "key")?;
        let value = field(form, "value")?;
        let user = self.user_mut(form)?;
        user.vars.insert(key.to_string(), Value::String(value.to_string()));
        Ok(json!({"error": false}))
    }

    fn change_password(&mut self, form: &Fields) -> Outcome {
        let old = field(form, "oldpassword")?;
        let new = field(form, "newpassword")?;
        let user = self.user_mut(form)?;
        if user.password != old {
            return Err("Old password is incorrect.".to_string());
        }
        user.password = new.to_string();
        Ok(json!({"error": false}))
    }

    fn send_message(&mut self, form: &Fields) -> Outcome {
        let author = self.session_user(form)?;
        let message = field(form, "message")?;
        if message.trim().is_empty() {
            return Err("Message is empty.".to_string());
        }
        let id = Uuid::new_v4();
        self.chat.push(ChatMessage {
            id,
            author,
            message: message.to_string(),
            edited: false,
        });
        Ok(json!({"error": false, "id": id}))
    }

    fn own_message(&mut self, form: &Fields) -> Result<usize, String> {
        let author = self.session_user(form)?;
        let id: Uuid = field(form, "mid")?
            .parse()
            .map_err(|_| "Invalid message id.".to_string())?;
        let index = self
            .chat
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| "Message not found.".to_string())?;
        if self.chat[index].author != author {
            return Err("Not your message.".to_string());
        }
        Ok(index)
    }

    fn delete_message(&mut self, form: &Fields) -> Outcome {
        let index = self.own_message(form)?;
        self.chat.remove(index);
        Ok(json!({"error": false}))
    }

    /// The client only sends `mid`; a `message` field, when present,
    /// replaces the text.
    fn edit_message(&mut self, form: &Fields) -> Outcome {
        let index = self.own_message(form)?;
        let entry = &mut self.chat[index];
        if let Some(message) = form.get("message") {
            entry.message = message.clone();
        }
        entry.edited = true;
        Ok(json!({"error": false, "message": entry}))
    }
}

fn field<'a>(form: &'a Fields, name: &str) -> Result<&'a str, String> {
    form.get(name)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing field: {name}."))
}

fn failure(message: &str) -> Value {
    json!({"error": true, "message": message})
}

pub type Db = Arc<RwLock<Backend>>;

pub fn app() -> Router {
    app_with(Backend::seeded(SEED_APPID))
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    Router::new()
        .route("/api/ip", get(client_ip))
        .route("/app/{appid}/api", post(app_api))
        .route("/executeapi/{id}", post(execute_api))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn client_ip() -> Json<Value> {
    Json(json!({"ip": "127.0.0.1"}))
}

async fn app_api(
    State(db): State<Db>,
    Path(appid): Path<String>,
    Form(form): Form<Fields>,
) -> Json<Value> {
    let mut backend = db.write().await;
    let action = form.get("action").cloned().unwrap_or_default();
    let response = if appid == backend.appid {
        backend.handle(&form)
    } else {
        failure("Invalid application.")
    };
    info!(%appid, %action, error = %response["error"], "handled app request");
    Json(response)
}

async fn execute_api(Path(id): Path<String>, Form(form): Form<Fields>) -> Json<Value> {
    info!(%id, fields = form.len(), "handled execute request");
    Json(json!({"error": false, "id": id, "received": form}))
}
