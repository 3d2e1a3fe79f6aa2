//! # Envelopes
//!
//! The request and response messages carried by a `CallChannel`.
//!
//! ```text
//! request:  {"targetServiceName":"math","signature":"fun add(..): ..","suspendCallbackName":null,"args":"[2,3]"}
//! response: {"result":"5"} | {"failure":"boom"} | {"unknownService":true}
//! ```
//!
//! `args` and `result` are opaque codec output; the envelope only routes them.

use serde::Deserialize;
use serde::Serialize;

use crate::channel::TransportError;

/// Built-in member answered by every endpoint with the target's `ServiceType`.
pub const SERVICE_TYPE_SIGNATURE: &str = "fun serviceType(): neobridge.ServiceType";

/// Built-in member of a suspend callback; its argument is an encoded `Response`.
pub const RESUME_SIGNATURE: &str = "fun resume(neobridge.Response): neobridge.Unit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    pub target_service_name: String,
    pub signature: String,
    #[serde(default)]
    pub suspend_callback_name: Option<String>,
    pub args: String,
}

impl CallEnvelope {
    pub fn new(target: impl Into<String>, signature: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            target_service_name: target.into(),
            signature: signature.into(),
            suspend_callback_name: None,
            args: args.into(),
        }
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.suspend_callback_name = Some(callback.into());
        self
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Result(String),
    Failure(String),
    UnknownService,
}

/// Flat wire shape; exactly one field is set.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    unknown_service: bool,
}

impl Response {
    /// Acknowledges a suspending call or a callback delivery.
    pub fn ack() -> Self {
        Self::Result(String::new())
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        let wire = match self {
            Self::Result(r) => WireResponse { result: Some(r.clone()), ..Default::default() },
            Self::Failure(f) => WireResponse { failure: Some(f.clone()), ..Default::default() },
            Self::UnknownService => WireResponse { unknown_service: true, ..Default::default() },
        };
        serde_json::to_string(&wire).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, TransportError> {
        let wire: WireResponse =
            serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))?;

        match wire {
            WireResponse { result: Some(r), failure: None, unknown_service: false } => Ok(Self::Result(r)),
            WireResponse { result: None, failure: Some(f), unknown_service: false } => Ok(Self::Failure(f)),
            WireResponse { result: None, failure: None, unknown_service: true } => Ok(Self::UnknownService),
            _ => Err(TransportError::Protocol(format!("ambiguous response: {}", text))),
        }
    }
}
