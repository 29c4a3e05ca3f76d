use api_forms::{Error, Field, Form, InputForm, OutputForm, Secret, Tainted};
use serde_json::{json, Map, Value};

fn record(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn required_field_is_reported_by_name() {
    let form = InputForm::new(
        Form::new()
            .field("email", Field::string().required())
            .field("age", Field::integer()),
    );

    let err = form.process(&record(json!({"age": 2}))).unwrap_err();
    assert!(matches!(err, Error::RequiredField { ref field } if field == "email"));
    assert_eq!(err.to_string(), "email is required");

    let processed = form.process(&record(json!({"email": "a@b.com"}))).unwrap();
    assert_eq!(Value::Object(processed), json!({"email": "a@b.com", "age": null}));
}

#[test]
fn invalid_value_message_names_field_and_value() {
    let form = InputForm::new(Form::new().field("email", Field::string().min_length(5)));

    let err = form.process(&record(json!({"email": "1234"}))).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));
    assert!(err.to_string().contains("email=1234"), "{err}");
    assert_eq!(err.public_reason(), err.to_string());
}

#[test]
fn list_elements_are_coerced_not_rejected() {
    let field = Field::list(Field::string);
    assert_eq!(field.validate(&json!(["qw", 123])).unwrap(), json!(["qw", "123"]));
}

#[test]
fn output_form_strips_undeclared_keys_and_applies_key_map() {
    let form = OutputForm::new(
        Form::new()
            .field("id", Field::integer())
            .field("email", Field::string().key_map("user_email")),
    );

    let output = form
        .process(&json!([
            {"id": "1", "user_email": "a@b.c", "password_hash": "x"},
            {"id": 2.9, "user_email": "d@e.f"},
        ]))
        .unwrap();

    assert_eq!(
        output,
        json!([{"id": 1, "email": "a@b.c"}, {"id": 2, "email": "d@e.f"}])
    );
}

#[test]
fn absent_subforms_have_distinct_policies() {
    let address = Form::new().field("city", Field::string());
    let form = OutputForm::new(
        Form::new()
            .field("home", Field::subform(address.clone()))
            .field("previous", Field::list_subform(address.clone()))
            .field("by_label", Field::dict_subform(address)),
    );

    assert_eq!(
        form.process(&json!({})).unwrap(),
        json!({"home": null, "previous": [], "by_label": null})
    );
}

#[test]
fn nested_input_errors_surface_through_the_parent_field() {
    let address = Form::new().field("city", Field::string().required());
    let form = InputForm::new(Form::new().field("home", Field::subform(address)));

    let err = form
        .process(&record(json!({"home": {"zip": "123"}})))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == "home"));
    assert!(err.to_string().contains("city is required"), "{err}");
}

#[test]
fn tainted_input_only_opens_through_a_form() {
    let payload = Tainted::new(record(json!({"age": "12"})));

    // Uncommenting this would fail to compile:
    // let _m: Map<String, Value> = payload;

    let form = InputForm::new(Form::new().field("age", Field::integer()));
    let processed = form.process_tainted(payload).unwrap();
    assert_eq!(processed["age"], json!(12));
}

#[test]
fn secret_is_fully_redacted() {
    let key = Secret::new("-----BEGIN PUBLIC KEY-----".to_string());

    let debug_out = format!("{:?}", key);
    assert_eq!(debug_out, "[REDACTED]");
    assert!(!debug_out.contains("BEGIN"));
    assert!(!debug_out.contains("String"));

    assert_eq!(format!("{}", key), "[REDACTED]");
}

#[test]
fn forms_are_shareable_across_threads() {
    let form = std::sync::Arc::new(InputForm::new(
        Form::new().field("n", Field::integer().min_value(0)),
    ));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let form = form.clone();
            std::thread::spawn(move || {
                let mut raw = Map::new();
                raw.insert("n".to_string(), json!(i));
                form.process(&raw).map(|processed| processed["n"].clone())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().unwrap(), json!(i));
    }
}
