//! Blocking client: `FusionApp` plus a `Transport`.
//!
//! Every method performs exactly one round-trip: build, execute, parse.
//! Methods that can change session state or the blob caches take `&mut self`;
//! a `FusionClient` is meant to be driven from one thread at a time.

use serde_json::Value;

use crate::client::{build_client_ip, parse_client_ip, FusionApp};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Session, VarLookup};

/// Look up this machine's public IP as seen by the default FusionAPI server.
pub fn client_ip() -> Result<String, ApiError> {
    let config = ClientConfig::default();
    client_ip_with(&UreqTransport::new(&config), &config.base_url)
}

/// Look up the caller's IP through an explicit transport and server.
pub fn client_ip_with<T: Transport>(transport: &T, base_url: &str) -> Result<String, ApiError> {
    parse_client_ip(transport.execute(build_client_ip(base_url))?)
}

/// One application on a FusionAPI server, with its own session.
pub struct FusionClient<T = UreqTransport> {
    app: FusionApp,
    transport: T,
}

impl FusionClient<UreqTransport> {
    /// Client for `appid` on the public server with transport defaults.
    pub fn new(appid: &str) -> Self {
        Self::with_config(appid, &ClientConfig::default())
    }

    pub fn with_config(appid: &str, config: &ClientConfig) -> Self {
        Self::with_transport(&config.base_url, appid, UreqTransport::new(config))
    }
}

impl<T: Transport> FusionClient<T> {
    pub fn with_transport(base_url: &str, appid: &str, transport: T) -> Self {
        Self {
            app: FusionApp::new(base_url, appid),
            transport,
        }
    }

    /// The underlying request builder and session state.
    pub fn app(&self) -> &FusionApp {
        &self.app
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn appid(&self) -> &str {
        self.app.appid()
    }

    pub fn session(&self) -> &Session {
        self.app.session()
    }

    pub fn username(&self) -> &str {
        self.app.username()
    }

    pub fn is_logged_in(&self) -> bool {
        self.app.is_logged_in()
    }

    pub fn app_cache(&self) -> Option<&Value> {
        self.app.app_cache()
    }

    pub fn user_cache(&self) -> Option<&Value> {
        self.app.user_cache()
    }

    fn round_trip(&self, req: HttpRequest) -> Result<Value, ApiError> {
        let response = self.transport.execute(req)?;
        self.app.parse_response(response)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<Value, ApiError> {
        let response = self.transport.execute(self.app.build_login(username, password))?;
        self.app.parse_login(username, response)
    }

    pub fn check_2fa(&self, username: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_check_2fa(username))
    }

    pub fn register(&self, username: &str, password: &str, token: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_register(username, password, token))
    }

    pub fn change_password(&self, old: &str, new: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_change_password(old, new))
    }

    pub fn app_blob(&mut self) -> Result<Value, ApiError> {
        let response = self.transport.execute(self.app.build_app_blob())?;
        self.app.parse_app_blob(response)
    }

    pub fn user_blob(&mut self) -> Result<Value, ApiError> {
        let response = self.transport.execute(self.app.build_user_blob())?;
        self.app.parse_user_blob(response)
    }

    pub fn get_user_vars(&self) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_get_user_vars())
    }

    pub fn get_app_vars(&self) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_get_app_vars())
    }

    /// One app variable, or the string `"Invalid Variable."` if it is absent.
    pub fn get_app_var(&self, var: &str) -> Result<Value, ApiError> {
        Ok(self.lookup_app_var(var)?.into_legacy())
    }

    /// One user variable, or the string `"Invalid Variable."` if it is absent.
    pub fn get_user_var(&self, var: &str) -> Result<Value, ApiError> {
        Ok(self.lookup_user_var(var)?.into_legacy())
    }

    pub fn lookup_app_var(&self, var: &str) -> Result<VarLookup, ApiError> {
        let response = self.transport.execute(self.app.build_get_app_var())?;
        self.app.parse_app_var(var, response)
    }

    pub fn lookup_user_var(&self, var: &str) -> Result<VarLookup, ApiError> {
        let response = self.transport.execute(self.app.build_get_user_var())?;
        self.app.parse_user_var(var, response)
    }

    pub fn set_user_var(&self, key: &str, value: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_set_user_var(key, value))
    }

    pub fn get_app_chat(&self) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_get_app_chat())
    }

    pub fn delete_app_message(&self, message_id: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_delete_app_message(message_id))
    }

    pub fn edit_app_message(&self, message_id: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_edit_app_message(message_id))
    }

    pub fn send_app_message(&self, content: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_send_app_message(content))
    }

    pub fn execute_api(&self, id: &str, data: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_execute_api(id, data))
    }

    pub fn execute_auth_api(&self, id: &str, data: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_execute_auth_api(id, data))
    }

    pub fn execute_time_api(&self, id: &str, data: &str, time: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_execute_time_api(id, data, time))
    }

    pub fn execute_full_api(&self, id: &str, data: &str, time: &str) -> Result<Value, ApiError> {
        self.round_trip(self.app.build_execute_full_api(id, data, time))
    }
}
