//! API-gateway style event adapter.
//!
//! Converts proxy-integration events into [`Request`]s and [`Response`]
//! envelopes into proxy replies, so a handler can sit directly behind a
//! function-as-a-service runtime.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::handler::{Handler, Stage};
use crate::logging::RequestLog;
use crate::request::{Method, Request, UnknownMethod};
use crate::response::Response;

/// An incoming proxy event.
///
/// # Examples
///
/// ```
/// use api_forms::PlatformEvent;
///
/// let event: PlatformEvent = serde_json::from_str(r#"{
///     "httpMethod": "GET",
///     "headers": {"Authenticate": "token"},
///     "queryStringParameters": {"page": "2"},
///     "requestContext": {"requestId": "abc-123"}
/// }"#).unwrap();
///
/// let request = event.into_request().unwrap();
/// assert_eq!(request.request_id(), "abc-123");
/// assert_eq!(request.header("authenticate"), Some("token"));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEvent {
    /// HTTP method name
    pub http_method: String,
    /// Request headers
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Query string parameters
    #[serde(default)]
    pub query_string_parameters: Option<Map<String, Value>>,
    /// Raw body
    #[serde(default)]
    pub body: Option<String>,
    /// Whether `body` is base64-encoded
    #[serde(default)]
    pub is_base64_encoded: bool,
    /// Platform request metadata
    #[serde(default)]
    pub request_context: Option<EventContext>,
}

/// Platform request metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    /// Platform-assigned request ID
    #[serde(default)]
    pub request_id: Option<String>,
}

impl PlatformEvent {
    /// Converts the event into a transport-neutral request.
    ///
    /// A missing request ID is replaced by a generated UUID.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] for an unsupported method or an undecodable
    /// base64 body.
    pub fn into_request(self) -> Result<Request, TransportError> {
        let method: Method = self.http_method.parse()?;

        let mut request = Request::new(request_id(self.request_context.as_ref()), method);

        for (name, value) in self.headers.unwrap_or_default() {
            request.add_header(name, value);
        }
        for (name, value) in self.query_string_parameters.unwrap_or_default() {
            request.add_query_param(name, value);
        }

        if let Some(body) = self.body {
            let body = if self.is_base64_encoded {
                let bytes = STANDARD
                    .decode(body.trim())
                    .map_err(|err| TransportError::InvalidBase64(err.to_string()))?;
                String::from_utf8(bytes).map_err(|_| TransportError::InvalidUtf8)?
            } else {
                body
            };
            request.set_body(body);
        }

        Ok(request)
    }
}

/// The platform request ID, or a generated UUID when absent or empty.
fn request_id(context: Option<&EventContext>) -> String {
    context
        .and_then(|context| context.request_id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// The event could not be turned into a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The method is not supported
    UnknownMethod(UnknownMethod),
    /// A base64 body did not decode
    InvalidBase64(String),
    /// A decoded body was not UTF-8 text
    InvalidUtf8,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::UnknownMethod(err) => write!(f, "{err}"),
            TransportError::InvalidBase64(reason) => write!(f, "body is not valid base64: {reason}"),
            TransportError::InvalidUtf8 => write!(f, "body is not valid UTF-8"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::UnknownMethod(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UnknownMethod> for TransportError {
    fn from(err: UnknownMethod) -> Self {
        TransportError::UnknownMethod(err)
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::decode(err.to_string())
    }
}

/// An outgoing proxy reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformReply {
    /// Always `false`: bodies are JSON text
    pub is_base64_encoded: bool,
    /// HTTP status code
    pub status_code: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Serialized envelope
    pub body: String,
}

impl From<&Response> for PlatformReply {
    fn from(response: &Response) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            is_base64_encoded: false,
            status_code: response.status_code(),
            headers,
            body: response.to_value().to_string(),
        }
    }
}

impl Handler {
    /// Runs a full proxy round trip: event in, reply out.
    ///
    /// # Examples
    ///
    /// ```
    /// use api_forms::{Handler, Method, PlatformEvent};
    /// use serde_json::json;
    ///
    /// let handler = Handler::builder(Method::Get).build(|_| Ok(json!({"pong": true})));
    ///
    /// let event: PlatformEvent = serde_json::from_value(json!({"httpMethod": "GET"})).unwrap();
    /// let reply = handler.handle_event(event);
    ///
    /// assert_eq!(reply.status_code, 200);
    /// assert_eq!(reply.body, r#"{"status":"OK","body":{"pong":true}}"#);
    /// ```
    pub fn handle_event(&self, event: PlatformEvent) -> PlatformReply {
        let fallback_id = request_id(event.request_context.as_ref());

        match event.into_request() {
            Ok(request) => PlatformReply::from(&self.handle(&request)),
            Err(err) => {
                let error = Error::from(err);
                RequestLog::new(&fallback_id).failure(
                    Stage::Decoding,
                    error.category(),
                    &error.log_detail(),
                );
                PlatformReply::from(&Response::from_error(&error))
            }
        }
    }
}
