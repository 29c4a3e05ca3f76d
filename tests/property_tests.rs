//! Integration property tests for api-forms.
//!
//! These tests validate cross-module invariants and end-to-end flows
//! using property-based testing.

use api_forms::{Field, Form, Handler, Method, OutputForm, Request, Response};
use proptest::prelude::*;
use serde_json::{json, Value};

// Strategy: Generate arbitrary JSON scalars
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::from),
    ]
}

// Strategy: Generate arbitrary flat JSON objects
fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,6}", arb_scalar(), 0..6)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

fn signup_handler() -> Handler {
    Handler::builder(Method::Post)
        .input(
            Form::new()
                .field("email", Field::string().required().min_length(3))
                .field("age", Field::integer().min_value(0).max_value(150))
                .field("newsletter", Field::boolean().default(false)),
        )
        .output(
            Form::new()
                .field("email", Field::string())
                .field("newsletter", Field::boolean()),
        )
        .build(|ctx| Ok(Value::Object(ctx.input().cloned().unwrap_or_default())))
}

proptest! {
    /// Property: The pipeline always answers with a well-formed envelope
    ///
    /// Whatever the body, the handler never panics, and the response is
    /// either OK or a FAIL carrying a client or server status code.
    #[test]
    fn proptest_pipeline_always_renders_an_envelope(body in "[ -~]{0,64}") {
        let mut request = Request::new("req-prop", Method::Post);
        request.set_body(body);

        match signup_handler().handle(&request) {
            Response::Ok { body } => {
                prop_assert!(body.get("email").is_some_and(Value::is_string));
            }
            Response::Fail { status_code, reason } => {
                prop_assert_eq!(status_code, 400);
                prop_assert!(!reason.is_empty());
            }
        }
    }

    /// Property: Arbitrary JSON objects never produce a server error
    ///
    /// Bad input is always the caller's fault, never a 500.
    #[test]
    fn proptest_object_bodies_are_client_errors_at_worst(object in arb_object()) {
        let mut request = Request::new("req-prop", Method::Post);
        request.set_body(object.to_string());

        let response = signup_handler().handle(&request);
        prop_assert!(response.status_code() == 200 || response.status_code() == 400);
    }

    /// Property: Output forms are idempotent on their own output
    #[test]
    fn proptest_output_form_is_idempotent(records in prop::collection::vec(arb_object(), 0..4)) {
        let form = OutputForm::new(
            Form::new()
                .field("a", Field::string())
                .field("b", Field::boolean().default(true))
                .field("c", Field::json()),
        );

        let once = form.process(&Value::Array(records)).unwrap();
        let twice = form.process(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: Optional fields with a default surface it exactly when absent
    #[test]
    fn proptest_default_fills_only_absent_values(value in prop::option::of(-1000i64..1000)) {
        let field = Field::integer().default(42);
        let raw = value.map_or(Value::Null, Value::from);

        let expected = json!(value.unwrap_or(42));
        prop_assert_eq!(field.validate(&raw).unwrap(), expected);
    }
}
