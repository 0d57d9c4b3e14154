#![forbid(unsafe_code)]

use crate::error::Error;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Response body shared by every control endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub code: i64,
    pub data: Value,
    pub message: String,
}

impl Envelope {
    pub const OK: i64 = 200;

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }

    /// Turn a non-200 code into [`Error::Rejected`].
    pub fn into_ok(self) -> Result<Self, Error> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::Rejected {
                code: self.code,
                message: self.message,
            })
        }
    }

    /// `data` as a plain string; login returns its token this way.
    pub fn data_string(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Decode `data` as `T`. Some agent versions send the payload as a
    /// JSON document embedded in a string; both shapes are accepted.
    pub fn decode_data<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        match self.data {
            Value::Null => Ok(T::default()),
            Value::String(s) if s.trim().is_empty() => Ok(T::default()),
            Value::String(s) => Ok(serde_json::from_str(&s)?),
            other => Ok(serde_json::from_value(other)?),
        }
    }
}
