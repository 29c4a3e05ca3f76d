//! Declarative validation and a fixed request pipeline for serverless API handlers.
//!
//! This crate turns an untrusted request into a response envelope through:
//! - **Fields**: typed, constraint-checked values that coerce raw JSON
//! - **Forms**: ordered fields, used to validate input or to shape output,
//!   nesting through subform fields
//! - **Handlers**: authenticate → decode → validate input → execute →
//!   validate output → respond, with every failure mapped to a status code
//!
//! # Core Types
//!
//! - [`Field`]: A single value declaration and its validation
//! - [`Form`], [`InputForm`], [`OutputForm`]: Schemas and their two roles
//! - [`Handler`]: One API method and its pipeline
//! - [`Error`] and [`Category`]: The failure taxonomy and its status codes
//! - [`Response`]: The `OK`/`FAIL` envelope
//! - [`Tainted<T>`]: Decoded input no form has validated yet
//! - [`Secret<T>`]: Wrapper that redacts key material in logs/output
//!
//! # Examples
//!
//! ```
//! use api_forms::{Field, Form, Handler, Method, Request};
//! use serde_json::json;
//!
//! let handler = Handler::builder(Method::Post)
//!     .input(
//!         Form::new()
//!             .field("email", Field::string().required())
//!             .field("age", Field::integer().min_value(18)),
//!     )
//!     .output(Form::new().field("email", Field::string()))
//!     .build(|ctx| Ok(json!({"email": ctx.get("email"), "internal_id": 7})));
//!
//! let mut request = Request::new("req-123", Method::Post);
//! request.set_body(r#"{"email": "qwe@gmail.com", "age": "21"}"#);
//! let response = handler.handle(&request);
//! assert_eq!(response.to_value(), json!({"status": "OK", "body": {"email": "qwe@gmail.com"}}));
//!
//! let mut request = Request::new("req-124", Method::Post);
//! request.set_body(r#"{"email": "qwe@gmail.com", "age": 3}"#);
//! let response = handler.handle(&request);
//! assert_eq!(response.status_code(), 400);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod authz;
mod config;
mod context;
pub mod docs;
mod error;
mod field;
mod form;
mod handler;
pub mod logging;
mod request;
mod response;
mod secret;
mod tainted;
mod transport;

pub use auth::{AuthError, Identity, JwtVerifier, TokenVerifier};
pub use authz::{AllowList, AuthorizationError, Authorizer};
pub use config::{AuthConfig, ConfigError, VerifierKey, DEFAULT_TOKEN_HEADER};
pub use context::Context;
pub use error::{Category, Error, FieldError, SERVER_ERROR_REASON};
pub use field::{Field, FieldFactory, FieldKind, NumericBound};
pub use form::{Form, InputForm, OutputForm};
pub use handler::{Endpoint, Failure, Handler, HandlerBuilder, Stage};
pub use logging::RequestLog;
pub use request::{Method, Request, UnknownMethod};
pub use response::Response;
pub use secret::Secret;
pub use tainted::Tainted;
pub use transport::{EventContext, PlatformEvent, PlatformReply, TransportError};
