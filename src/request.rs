use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::tainted::Tainted;

/// HTTP method of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
}

impl Method {
    /// Returns the canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
        }
    }

    /// Read-style methods take their input from the query string, the rest
    /// from a JSON body.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Method::Get | Method::Head | Method::Delete | Method::Options
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The method name was not one of the supported HTTP methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported http method [{}]", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A transport-neutral request.
///
/// Built by a transport adapter (see [`PlatformEvent`](crate::PlatformEvent))
/// or directly in tests through the mutator methods.
///
/// `Debug` output keeps header names but hides the values of credential
/// headers such as `Authenticate`, `Authorization` and `Cookie`.
///
/// # Examples
///
/// ```
/// use api_forms::{Method, Request};
///
/// let mut request = Request::new("req-1", Method::Get);
/// request.add_header("Authenticate", "token");
/// request.add_query_param("page", "2");
///
/// assert_eq!(request.header("authenticate"), Some("token"));
/// ```
#[derive(Clone)]
pub struct Request {
    request_id: String,
    method: Method,
    headers: BTreeMap<String, String>,
    query: Map<String, Value>,
    body: Option<String>,
}

impl Request {
    /// Creates a request with no headers, query parameters or body.
    pub fn new(request_id: impl Into<String>, method: Method) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            headers: BTreeMap::new(),
            query: Map::new(),
            body: None,
        }
    }

    /// Creates a request with a freshly generated request ID.
    pub fn with_generated_id(method: Method) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), method)
    }

    /// Adds a header. A later header with the same name replaces the earlier one.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Adds a query parameter.
    pub fn add_query_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.query.insert(name.into(), value.into());
    }

    /// Sets the raw body.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Looks up a header by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns all headers.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns the raw body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Extracts the raw input mapping.
    ///
    /// Read-style methods yield the query parameters. Write-style methods parse
    /// the body as a JSON object; an empty or missing body yields an empty
    /// mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not valid JSON or not an object.
    pub fn input(&self) -> Result<Tainted<Map<String, Value>>, Error> {
        if self.method.is_read() {
            return Ok(Tainted::new(self.query.clone()));
        }

        let body = self.body.as_deref().unwrap_or_default();
        if body.trim().is_empty() {
            return Ok(Tainted::new(Map::new()));
        }

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Ok(Tainted::new(map)),
            Ok(_) => Err(Error::decode("the body must be a JSON object")),
            Err(err) => Err(Error::decode(err.to_string())),
        }
    }
}

/// Header name fragments whose values never appear in `Debug` output.
const CREDENTIAL_HEADER_HINTS: [&str; 5] = ["auth", "token", "cookie", "secret", "key"];

fn is_credential_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    CREDENTIAL_HEADER_HINTS.iter().any(|hint| name.contains(hint))
}

struct Redacted;

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

struct RedactedHeaders<'a>(&'a BTreeMap<String, String>);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                let value: &dyn fmt::Debug = if is_credential_header(name) {
                    &Redacted
                } else {
                    value
                };
                (name, value)
            }))
            .finish()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("headers", &RedactedHeaders(&self.headers))
            .field("query", &self.query)
            .field("body", &self.body)
            .finish()
    }
}
