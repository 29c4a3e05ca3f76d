use serde_json::{Map, Value};

use crate::auth::Identity;
use crate::authz::{self, Authorizer};
use crate::error::Error;
use crate::logging::RequestLog;
use crate::request::{Method, Request};

/// What business logic gets to see of a request.
///
/// A `Context` is built by the [`Handler`](crate::Handler) after
/// authentication and input validation succeeded. It carries the verified
/// identity (if the handler authenticates), the canonical input (if the
/// handler declares an input form) and a request-scoped logger.
///
/// `Context` cannot be constructed by user code.
///
/// # Examples
///
/// ```
/// use api_forms::{Field, Form, Handler, Method, Request};
/// use serde_json::json;
///
/// let handler = Handler::builder(Method::Get)
///     .input(Form::new().field("name", Field::string().default("world")))
///     .build(|ctx| {
///         ctx.log().info(format_args!("greeting"));
///         Ok(json!({"greeting": format!("hello {}", ctx.get("name").and_then(|v| v.as_str()).unwrap_or_default())}))
///     });
///
/// let response = handler.handle(&Request::new("req-1", Method::Get));
/// assert_eq!(response.to_value()["body"], json!({"greeting": "hello world"}));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    request: &'a Request,
    identity: Option<&'a Identity>,
    input: Option<&'a Map<String, Value>>,
    log: RequestLog<'a>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        request: &'a Request,
        identity: Option<&'a Identity>,
        input: Option<&'a Map<String, Value>>,
    ) -> Self {
        Self {
            request,
            identity,
            input,
            log: RequestLog::new(request.request_id()),
        }
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &'a str {
        self.request.request_id()
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.request.method()
    }

    /// Returns the request itself, for headers.
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// Returns the authenticated caller, if the handler authenticates.
    pub fn identity(&self) -> Option<&'a Identity> {
        self.identity
    }

    /// Returns the validated input, if the handler declares an input form.
    pub fn input(&self) -> Option<&'a Map<String, Value>> {
        self.input
    }

    /// Returns one validated input value.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.input.and_then(|input| input.get(name))
    }

    /// Returns the request-scoped logger.
    pub fn log(&self) -> RequestLog<'a> {
        self.log
    }

    /// Asks `authorizer` whether the caller may perform `action` on `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Permission`] if the caller is denied or the authorizer
    /// cannot be reached.
    pub fn require_permission(
        &self,
        authorizer: &dyn Authorizer,
        action: &str,
        data: &Value,
    ) -> Result<(), Error> {
        authz::check(authorizer, self.identity, action, data, self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AllowList;
    use serde_json::json;

    #[test]
    fn context_exposes_request_and_input() {
        let request = Request::new("req-123", Method::Post);
        let mut input = Map::new();
        input.insert("age".to_string(), json!(3));

        let ctx = Context::new(&request, None, Some(&input));

        assert_eq!(ctx.request_id(), "req-123");
        assert_eq!(ctx.method(), Method::Post);
        assert_eq!(ctx.get("age"), Some(&json!(3)));
        assert_eq!(ctx.get("missing"), None);
        assert!(ctx.identity().is_none());
        assert_eq!(ctx.log().request_id(), "req-123");
    }

    #[test]
    fn debug_output_never_shows_the_token() {
        let mut request = Request::new("req-5", Method::Get);
        request.add_header("Authenticate", "header.claims.signature");

        let ctx = Context::new(&request, None, None);
        let debug = format!("{ctx:?}");

        assert!(!debug.contains("header.claims.signature"), "{debug}");
        assert!(debug.contains("[REDACTED]"), "{debug}");
    }

    #[test]
    fn context_without_input_form_has_no_input() {
        let mut request = Request::new("req-1", Method::Get);
        request.add_query_param("age", "3");

        let ctx = Context::new(&request, None, None);
        assert!(ctx.input().is_none());
        assert_eq!(ctx.get("age"), None);
    }

    #[test]
    fn require_permission_uses_the_identity() {
        let request = Request::new("req-1", Method::Delete);
        let identity = Identity::new("ann@x.io");
        let allow = AllowList::new().allow("ann@x.io", "delete");

        let ctx = Context::new(&request, Some(&identity), None);
        assert!(ctx.require_permission(&allow, "delete", &Value::Null).is_ok());

        let err = ctx
            .require_permission(&allow, "purge", &json!({"id": 1}))
            .unwrap_err();
        assert_eq!(err.category().status_code(), 403);

        let anonymous = Context::new(&request, None, None);
        assert!(anonymous
            .require_permission(&allow, "delete", &Value::Null)
            .is_err());
    }
}
