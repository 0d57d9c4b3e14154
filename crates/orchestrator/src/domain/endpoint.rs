#![forbid(unsafe_code)]

use crate::error::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Address of the HTTP control server exposed by an injected agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Contents of `<install>/run/<pid>/.token`, written by the agent once its
/// control server is listening: `namespace;username;password;host;port`.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeToken {
    pub namespace: String,
    pub username: String,
    pub password: String,
    pub endpoint: Endpoint,
}

impl FromStr for HandshakeToken {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let fields: Vec<&str> = compact.split(';').collect();
        let [namespace, username, password, host, port] = fields.as_slice() else {
            return Err(Error::TokenMalformed(fields.len()));
        };
        Ok(Self {
            namespace: (*namespace).to_owned(),
            username: (*username).to_owned(),
            password: (*password).to_owned(),
            endpoint: Endpoint::new(*host, *port),
        })
    }
}

impl fmt::Debug for HandshakeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeToken")
            .field("namespace", &self.namespace)
            .field("username", &self.username)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
