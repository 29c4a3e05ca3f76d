//! The request pipeline.
//!
//! A [`Handler`] runs a fixed sequence of stages for every request:
//!
//! ```text
//! Received -> Authenticating -> Decoding -> ValidatingInput -> Executing
//!          -> ValidatingOutput -> Responding
//! ```
//!
//! Any stage may end in `Failed`, which renders the error through its
//! [`Category`](crate::Category). Authentication runs only when a verifier is
//! attached; decoding and input validation only when an input form is
//! declared; output validation only when an output form is declared.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::auth::TokenVerifier;
use crate::authz::Authorizer;
use crate::context::Context;
use crate::error::Error;
use crate::form::{InputForm, OutputForm};
use crate::logging::RequestLog;
use crate::request::{Method, Request};
use crate::response::Response;

/// Business logic run by a handler.
pub type Endpoint = dyn Fn(&Context<'_>) -> Result<Value, Error> + Send + Sync;

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The request arrived.
    Received,
    /// The token verifier is establishing the caller's identity.
    Authenticating,
    /// The raw input mapping is being extracted.
    Decoding,
    /// The input form is validating the raw input.
    ValidatingInput,
    /// The permission check and business logic are running.
    Executing,
    /// The output form is shaping the result.
    ValidatingOutput,
    /// A success envelope is being returned.
    Responding,
    /// A failure envelope is being returned.
    Failed,
}

impl Stage {
    /// Returns `true` for `Responding` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Responding | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Authenticating => "authenticating",
            Stage::Decoding => "decoding",
            Stage::ValidatingInput => "validating input",
            Stage::Executing => "executing",
            Stage::ValidatingOutput => "validating output",
            Stage::Responding => "responding",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An error together with the stage it ended the pipeline in.
#[derive(Debug)]
pub struct Failure {
    stage: Stage,
    error: Error,
}

impl Failure {
    fn new(stage: Stage, error: Error) -> Self {
        Self { stage, error }
    }

    /// Returns the stage that failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the error.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Consumes the failure, returning the error.
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// One API method: optional authentication, optional input and output forms,
/// and the business logic in between.
///
/// Handlers are `Send + Sync` and can be shared across threads through `Arc`.
///
/// # Examples
///
/// ```
/// use api_forms::{Field, Form, Handler, Method, Request};
/// use serde_json::json;
///
/// let handler = Handler::builder(Method::Post)
///     .description("Creates a user")
///     .input(Form::new().field("email", Field::string().required()))
///     .output(Form::new().field("email", Field::string()))
///     .build(|ctx| Ok(json!({"email": ctx.get("email"), "password": "hidden"})));
///
/// let mut request = Request::new("req-1", Method::Post);
/// request.set_body(r#"{"email": "a@b.com"}"#);
/// let response = handler.handle(&request);
/// assert_eq!(response.to_value(), json!({"status": "OK", "body": {"email": "a@b.com"}}));
///
/// let response = handler.handle(&Request::new("req-2", Method::Post));
/// assert_eq!(
///     response.to_value(),
///     json!({"status": "FAIL", "status_code": 400, "reason": "email is required"})
/// );
/// ```
pub struct Handler {
    method: Method,
    description: Option<String>,
    input: Option<InputForm>,
    output: Option<OutputForm>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    permission: Option<(String, Arc<dyn Authorizer>)>,
    endpoint: Box<Endpoint>,
}

impl Handler {
    /// Starts building a handler for `method`.
    pub fn builder(method: Method) -> HandlerBuilder {
        HandlerBuilder {
            method,
            description: None,
            input: None,
            output: None,
            verifier: None,
            permission: None,
        }
    }

    /// Returns the HTTP method this handler serves.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the method description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the input form, if declared.
    pub fn input_form(&self) -> Option<&InputForm> {
        self.input.as_ref()
    }

    /// Returns the output form, if declared.
    pub fn output_form(&self) -> Option<&OutputForm> {
        self.output.as_ref()
    }

    /// Returns `true` if a token verifier is attached.
    pub fn authenticates(&self) -> bool {
        self.verifier.is_some()
    }

    /// Processes a request and renders the outcome as an envelope.
    ///
    /// Never panics on behalf of the business logic and never returns
    /// internal error detail to the caller.
    pub fn handle(&self, request: &Request) -> Response {
        let log = RequestLog::new(request.request_id());
        enter(log, Stage::Received);

        match self.run(request) {
            Ok(body) => {
                enter(log, Stage::Responding);
                Response::ok(body)
            }
            Err(failure) => {
                let error = failure.error();
                log.failure(failure.stage(), error.category(), &error.log_detail());
                enter(log, Stage::Failed);
                Response::from_error(error)
            }
        }
    }

    /// Runs the pipeline, returning the processed output or the failing stage.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] naming the stage that failed and its error.
    pub fn run(&self, request: &Request) -> Result<Value, Failure> {
        let log = RequestLog::new(request.request_id());

        let identity = match &self.verifier {
            Some(verifier) => {
                enter(log, Stage::Authenticating);
                let identity = contain(|| verifier.verify(request).map_err(Error::from))
                    .map_err(|err| Failure::new(Stage::Authenticating, err))?;
                Some(identity)
            }
            None => None,
        };

        let input = match &self.input {
            Some(form) => {
                enter(log, Stage::Decoding);
                let raw = request
                    .input()
                    .map_err(|err| Failure::new(Stage::Decoding, err))?;

                enter(log, Stage::ValidatingInput);
                let processed = contain(|| form.process_tainted(raw))
                    .map_err(|err| Failure::new(Stage::ValidatingInput, err))?;
                Some(processed)
            }
            None => None,
        };

        enter(log, Stage::Executing);
        let ctx = Context::new(request, identity.as_ref(), input.as_ref());
        let output = contain(|| self.execute(&ctx))
            .map_err(|err| Failure::new(Stage::Executing, err))?;

        match &self.output {
            Some(form) => {
                enter(log, Stage::ValidatingOutput);
                contain(|| form.process(&output))
                    .map_err(|err| Failure::new(Stage::ValidatingOutput, err))
            }
            None => Ok(output),
        }
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<Value, Error> {
        if let Some((action, authorizer)) = &self.permission {
            let data = ctx.input().cloned().map_or(Value::Null, Value::Object);
            ctx.require_permission(authorizer.as_ref(), action, &data)?;
        }

        (self.endpoint)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("method", &self.method)
            .field("description", &self.description)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("authenticates", &self.verifier.is_some())
            .field(
                "permission",
                &self.permission.as_ref().map(|(action, _)| action),
            )
            .finish_non_exhaustive()
    }
}

fn enter(log: RequestLog<'_>, stage: Stage) {
    tracing::trace!(request_id = %log.request_id(), stage = %stage, "entering stage");
}

/// Runs a stage that may call user code, turning a panic into
/// [`Error::Unexpected`].
fn contain<T>(stage: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    panic::catch_unwind(AssertUnwindSafe(stage))
        .unwrap_or_else(|payload| Err(Error::unexpected(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic while handling the request: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic while handling the request: {message}")
    } else {
        "panic while handling the request".to_string()
    }
}

/// Configures a [`Handler`].
pub struct HandlerBuilder {
    method: Method,
    description: Option<String>,
    input: Option<InputForm>,
    output: Option<OutputForm>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    permission: Option<(String, Arc<dyn Authorizer>)>,
}

impl HandlerBuilder {
    /// Sets the method description used in generated documentation.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Declares the input form.
    pub fn input(mut self, form: impl Into<InputForm>) -> Self {
        self.input = Some(form.into());
        self
    }

    /// Declares the output form.
    pub fn output(mut self, form: impl Into<OutputForm>) -> Self {
        self.output = Some(form.into());
        self
    }

    /// Requires authentication through `verifier`.
    pub fn authenticate(self, verifier: impl TokenVerifier + 'static) -> Self {
        self.authenticate_shared(Arc::new(verifier))
    }

    /// Requires authentication through a verifier shared with other handlers.
    pub fn authenticate_shared(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Requires the caller to hold `action`, checked against the validated
    /// input before the business logic runs.
    pub fn permission(
        mut self,
        action: impl Into<String>,
        authorizer: impl Authorizer + 'static,
    ) -> Self {
        self.permission = Some((action.into(), Arc::new(authorizer)));
        self
    }

    /// Attaches the business logic and finishes the handler.
    pub fn build<F>(self, endpoint: F) -> Handler
    where
        F: Fn(&Context<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Handler {
            method: self.method,
            description: self.description,
            input: self.input,
            output: self.output,
            verifier: self.verifier,
            permission: self.permission,
            endpoint: Box::new(endpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, Identity};
    use crate::authz::AllowList;
    use crate::error::Category;
    use crate::field::Field;
    use crate::form::Form;
    use serde_json::json;

    struct StaticVerifier(Result<Identity, AuthError>);

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, _request: &Request) -> Result<Identity, AuthError> {
            self.0.clone()
        }
    }

    fn echo() -> HandlerBuilder {
        Handler::builder(Method::Post)
            .input(Form::new().field("age", Field::integer().min_value(0)))
            .output(Form::new().field("age", Field::integer()))
    }

    fn post(body: &str) -> Request {
        let mut request = Request::new("req-1", Method::Post);
        request.set_body(body);
        request
    }

    #[test]
    fn stages_are_reported_where_they_fail() {
        let handler = Handler::builder(Method::Post)
            .authenticate(StaticVerifier(Err(AuthError::MissingToken)))
            .build(|_| Ok(json!({})));
        let failure = handler.run(&post("{}")).unwrap_err();
        assert_eq!(failure.stage(), Stage::Authenticating);
        assert_eq!(failure.error().category(), Category::Authentication);

        let handler = echo().build(|ctx| Ok(json!({"age": ctx.get("age")})));
        let failure = handler.run(&post("{oops")).unwrap_err();
        assert_eq!(failure.stage(), Stage::Decoding);

        let failure = handler.run(&post(r#"{"age": -3}"#)).unwrap_err();
        assert_eq!(failure.stage(), Stage::ValidatingInput);

        let handler = echo().build(|_| Err(Error::unexpected("db down")));
        let failure = handler.run(&post("{}")).unwrap_err();
        assert_eq!(failure.stage(), Stage::Executing);

        let handler = echo().build(|_| Ok(json!({"age": "many"})));
        let failure = handler.run(&post("{}")).unwrap_err();
        assert_eq!(failure.stage(), Stage::ValidatingOutput);
        assert!(failure.to_string().starts_with("validating output: server error"));
    }

    #[test]
    fn identity_reaches_the_business_logic() {
        let handler = Handler::builder(Method::Get)
            .authenticate(StaticVerifier(Ok(Identity::new("ann@x.io"))))
            .build(|ctx| Ok(json!({"email": ctx.identity().map(|id| id.email.clone())})));

        let response = handler.handle(&Request::new("req-1", Method::Get));
        assert_eq!(response, Response::ok(json!({"email": "ann@x.io"})));
        assert!(handler.authenticates());
    }

    #[test]
    fn missing_output_form_passes_output_through() {
        let handler = Handler::builder(Method::Get).build(|_| Ok(json!("raw")));
        assert_eq!(
            handler.handle(&Request::new("r", Method::Get)),
            Response::ok(json!("raw"))
        );
    }

    #[test]
    fn missing_input_form_skips_decoding() {
        let handler = Handler::builder(Method::Post).build(|ctx| Ok(json!(ctx.input().is_none())));
        assert_eq!(handler.handle(&post("{not json")), Response::ok(json!(true)));
    }

    #[test]
    fn panics_become_server_errors() {
        let handler = Handler::builder(Method::Get).build(|_| panic!("secret internals"));

        let failure = handler.run(&Request::new("r", Method::Get)).unwrap_err();
        assert_eq!(failure.error().category(), Category::Unanticipated);
        assert!(failure.error().log_detail().contains("secret internals"));

        let response = handler.handle(&Request::new("r", Method::Get));
        assert_eq!(response, Response::fail(500, "server error"));
    }

    struct PanickingVerifier;

    impl TokenVerifier for PanickingVerifier {
        fn verify(&self, _request: &Request) -> Result<Identity, AuthError> {
            panic!("key store unavailable")
        }
    }

    struct PanickingAuthorizer;

    impl Authorizer for PanickingAuthorizer {
        fn authorize(
            &self,
            _identity: Option<&Identity>,
            _action: &str,
            _data: &Value,
        ) -> Result<bool, crate::authz::AuthorizationError> {
            panic!("policy service client poisoned")
        }
    }

    #[test]
    fn verifier_panics_are_contained() {
        let handler = Handler::builder(Method::Get)
            .authenticate(PanickingVerifier)
            .build(|_| Ok(json!({})));

        let failure = handler.run(&Request::new("r", Method::Get)).unwrap_err();
        assert_eq!(failure.stage(), Stage::Authenticating);
        assert_eq!(failure.error().category(), Category::Unanticipated);
        assert!(failure.error().log_detail().contains("key store unavailable"));

        assert_eq!(
            handler.handle(&Request::new("r", Method::Get)),
            Response::fail(500, "server error")
        );
    }

    #[test]
    fn authorizer_panics_are_contained() {
        let handler = Handler::builder(Method::Get)
            .permission("orders:read", PanickingAuthorizer)
            .build(|_| Ok(json!({})));

        let failure = handler.run(&Request::new("r", Method::Get)).unwrap_err();
        assert_eq!(failure.stage(), Stage::Executing);
        assert_eq!(failure.error().category(), Category::Unanticipated);

        assert_eq!(
            handler.handle(&Request::new("r", Method::Get)),
            Response::fail(500, "server error")
        );
    }

    #[test]
    fn element_factory_panics_are_contained() {
        fn broken() -> Field {
            panic!("element factory misconfigured")
        }

        let handler = Handler::builder(Method::Post)
            .input(Form::new().field("tags", Field::list(broken)))
            .build(|_| Ok(json!({})));

        let failure = handler.run(&post(r#"{"tags": ["a"]}"#)).unwrap_err();
        assert_eq!(failure.stage(), Stage::ValidatingInput);
        assert_eq!(failure.error().category(), Category::Unanticipated);
        assert_eq!(
            handler.handle(&post(r#"{"tags": ["a"]}"#)),
            Response::fail(500, "server error")
        );
    }

    #[test]
    fn serde_errors_in_business_logic_are_server_errors() {
        let handler = Handler::builder(Method::Get).build(|_| {
            let stored: Value = serde_json::from_str("{\"truncated\": ")?;
            Ok(stored)
        });

        let failure = handler.run(&Request::new("r", Method::Get)).unwrap_err();
        assert!(matches!(failure.error(), Error::Unexpected { .. }));
        assert_eq!(
            handler.handle(&Request::new("r", Method::Get)),
            Response::fail(500, "server error")
        );
    }

    #[test]
    fn permission_is_checked_against_validated_input() {
        let builder = || {
            Handler::builder(Method::Post)
                .authenticate(StaticVerifier(Ok(Identity::new("ann@x.io"))))
                .input(Form::new().field("id", Field::integer()))
        };

        let allowed = builder()
            .permission("orders:delete", AllowList::new().allow("ann@x.io", "orders:delete"))
            .build(|_| Ok(json!({"deleted": true})));
        assert!(allowed.handle(&post(r#"{"id": 1}"#)).is_ok());

        let denied = builder()
            .permission("orders:delete", AllowList::new())
            .build(|_| Ok(json!({"deleted": true})));
        assert_eq!(
            denied.handle(&post(r#"{"id": 1}"#)),
            Response::fail(
                403,
                "permission denied for the user [ann@x.io] to perform the action [orders:delete]"
            )
        );
    }

    #[test]
    fn accessors_describe_the_handler() {
        let handler = echo().description("echoes age").build(|_| Ok(Value::Null));

        assert_eq!(handler.method(), Method::Post);
        assert_eq!(handler.description(), Some("echoes age"));
        assert!(handler.input_form().is_some());
        assert!(handler.output_form().is_some());
        assert!(!handler.authenticates());
        assert!(format!("{handler:?}").contains("echoes age"));
    }

    #[test]
    fn stage_terminality() {
        assert!(Stage::Responding.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Executing.is_terminal());
        assert_eq!(Stage::ValidatingInput.to_string(), "validating input");
    }

    #[test]
    fn handler_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Handler>();
    }
}
