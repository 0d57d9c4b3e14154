#![forbid(unsafe_code)]

use crate::control::{AgentControl, Connector, Envelope, LoginReply};
use crate::domain::{Dependency, Endpoint, ModuleInfo};
use crate::error::Error;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, trace};

pub const AUTH_HEADER: &str = "Authentication";

const LOGIN_PATH: &str = "/login";
const SHUTDOWN_PATH: &str = "/control/shutdown";
const MODULE_LIST_PATH: &str = "/module/list";
const MODULE_FLUSH_PATH: &str = "/module/flush";
const MODULE_DEACTIVATE_PATH: &str = "/module/deactivate";
const MODULE_PARAMETERS_PATH: &str = "/module/parameters";
const DEPENDENCY_PATH: &str = "/dependency/get";

/// HTTP client for one agent's control server.
#[derive(Debug, Clone)]
pub struct ControlClient {
    base_url: String,
    http: Client,
}

impl ControlClient {
    pub fn new(endpoint: &Endpoint, settings: &config::Control) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(concat!("rasp-supervisor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: endpoint.base_url(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        token: Option<&str>,
    ) -> Result<Envelope, Error> {
        let url = format!("{}{path}", self.base_url);
        trace!(%method, %url, "control request");

        let request = self.http.request(method.clone(), &url);
        let request = if method == Method::GET {
            request.query(params)
        } else {
            request.form(params)
        };
        Self::send(request, &url, token).await
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value, token: &str) -> Result<Envelope, Error> {
        let url = format!("{}{path}", self.base_url);
        trace!(%url, "control request");
        Self::send(self.http.post(&url).json(body), &url, Some(token)).await
    }

    async fn send(mut request: RequestBuilder, url: &str, token: Option<&str>) -> Result<Envelope, Error> {
        if let Some(token) = token {
            request = request.header(AUTH_HEADER, token);
        }

        let body = request.send().await?.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)?;
        debug!(%url, code = envelope.code, "control response");
        Ok(envelope)
    }
}

#[async_trait]
impl AgentControl for ControlClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginReply, Error> {
        let envelope = self
            .call(
                Method::POST,
                LOGIN_PATH,
                &[("username", username), ("password", password)],
                None,
            )
            .await?;
        Ok(LoginReply {
            token: envelope.data_string(),
            code: envelope.code,
            message: envelope.message,
        })
    }

    async fn shutdown(&self, token: &str) -> Result<(), Error> {
        self.call(Method::POST, SHUTDOWN_PATH, &[], Some(token))
            .await?
            .into_ok()?;
        Ok(())
    }

    async fn soft_flush(&self, token: &str) -> Result<(), Error> {
        self.call(Method::GET, MODULE_FLUSH_PATH, &[("force", "false")], Some(token))
            .await?
            .into_ok()?;
        Ok(())
    }

    async fn update_parameters(
        &self,
        token: &str,
        module: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let body = json!({ "moduleName": module, "parameters": parameters });
        self.post_json(MODULE_PARAMETERS_PATH, &body, token)
            .await?
            .into_ok()?;
        Ok(())
    }

    async fn list_modules(&self, token: &str) -> Result<Vec<ModuleInfo>, Error> {
        self.call(Method::GET, MODULE_LIST_PATH, &[], Some(token))
            .await?
            .into_ok()?
            .decode_data()
    }

    async fn degrade(&self, token: &str, module_ids: &[String]) -> Result<(), Error> {
        if module_ids.is_empty() {
            return Ok(());
        }
        let ids = module_ids.join(",");
        self.call(Method::POST, MODULE_DEACTIVATE_PATH, &[("ids", &ids)], Some(token))
            .await?
            .into_ok()?;
        Ok(())
    }

    async fn dependencies(&self, token: &str) -> Result<Vec<Dependency>, Error> {
        self.call(Method::GET, DEPENDENCY_PATH, &[], Some(token))
            .await?
            .into_ok()?
            .decode_data()
    }
}

/// Connects over HTTP with shared timeout settings. Every connection gets
/// its own [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    settings: config::Control,
}

impl HttpConnector {
    pub fn new(settings: config::Control) -> Self {
        Self { settings }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn AgentControl>, Error> {
        Ok(Box::new(ControlClient::new(endpoint, &self.settings)?))
    }
}
