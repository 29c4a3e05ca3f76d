//! Documentation generated from handler and form declarations.
//!
//! Everything here is read-only reflection: the same declarations that drive
//! validation describe the API.

use serde_json::{json, Map, Number, Value};

use crate::field::{Field, FieldKind};
use crate::form::Form;
use crate::handler::Handler;

/// Documents a set of handlers, one entry per handler in order.
///
/// Each entry is `{http_method, description, input, output}`; a handler
/// without an input or output form documents that side as `null`.
///
/// # Examples
///
/// ```
/// use api_forms::{docs, Field, Form, Handler, Method};
/// use serde_json::json;
///
/// let handler = Handler::builder(Method::Get)
///     .description("Lists users")
///     .output(Form::new().field("email", Field::string().help("User email")))
///     .build(|_| Ok(json!([])));
///
/// let documentation = docs::collect_documentation(&[&handler]);
/// assert_eq!(documentation[0]["http_method"], "GET");
/// assert_eq!(documentation[0]["input"], json!(null));
/// assert_eq!(documentation[0]["output"]["email"]["details"]["type"], "str");
/// ```
pub fn collect_documentation(handlers: &[&Handler]) -> Vec<Value> {
    handlers
        .iter()
        .map(|handler| {
            json!({
                "http_method": handler.method().as_str(),
                "description": handler.description(),
                "input": handler.input_form().map(|input| document_form(input.form())),
                "output": handler.output_form().map(|output| document_form(output.form())),
            })
        })
        .collect()
}

/// Documents a form as field name → field info, in declaration order.
pub fn document_form(form: &Form) -> Value {
    let fields: Map<String, Value> = form
        .fields()
        .map(|(name, field)| (name.to_string(), field_info(field)))
        .collect();
    Value::Object(fields)
}

/// Documents a single field as `{description, required, details}`.
pub fn field_info(field: &Field) -> Value {
    let mut details = Map::new();
    details.insert("type".to_string(), json!(field_type(field)));

    match field.kind() {
        FieldKind::Subform(form) | FieldKind::ListSubform(form) | FieldKind::DictSubform(form) => {
            details.insert("subform".to_string(), document_form(form));
        }
        kind => {
            details.insert(
                "default".to_string(),
                field.default_value().cloned().unwrap_or(Value::Null),
            );
            match kind {
                FieldKind::String {
                    min_length,
                    max_length,
                } => {
                    details.insert("min_length".to_string(), json!(min_length));
                    details.insert("max_length".to_string(), json!(max_length));
                }
                FieldKind::Integer {
                    min_value,
                    max_value,
                } => {
                    details.insert("min_value".to_string(), integer_bound(*min_value));
                    details.insert("max_value".to_string(), integer_bound(*max_value));
                }
                FieldKind::Float {
                    min_value,
                    max_value,
                } => {
                    details.insert("min_value".to_string(), float_bound(*min_value));
                    details.insert("max_value".to_string(), float_bound(*max_value));
                }
                FieldKind::List {
                    blank,
                    valid_values,
                    ..
                } => {
                    details.insert("blank".to_string(), json!(blank));
                    details.insert("valid_values".to_string(), json!(valid_values));
                }
                FieldKind::Dict { blank, .. } => {
                    details.insert("blank".to_string(), json!(blank));
                }
                _ => {}
            }
        }
    }

    json!({
        "description": field.help_text(),
        "required": field.is_required(),
        "details": details,
    })
}

/// Returns the documented type name of a field.
///
/// # Examples
///
/// ```
/// use api_forms::{docs::field_type, Field};
///
/// assert_eq!(field_type(&Field::list(Field::integer)), "list[int]");
/// assert_eq!(field_type(&Field::dict(|| Field::list(Field::string))), "dict[list[str]]");
/// ```
pub fn field_type(field: &Field) -> String {
    match field.kind() {
        FieldKind::String { .. } => "str".to_string(),
        FieldKind::Boolean => "bool".to_string(),
        FieldKind::Integer { .. } => "int".to_string(),
        FieldKind::Float { .. } => "float".to_string(),
        FieldKind::Json => "json".to_string(),
        FieldKind::List { element, .. } => format!("list[{}]", field_type(&element())),
        FieldKind::Dict { element, .. } => format!("dict[{}]", field_type(&element())),
        FieldKind::Subform(_) => "subform".to_string(),
        FieldKind::ListSubform(_) => "list subform".to_string(),
        FieldKind::DictSubform(_) => "dict subform".to_string(),
    }
}

fn integer_bound(bound: Option<f64>) -> Value {
    match bound {
        Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Value::from(value as i64)
        }
        other => float_bound(other),
    }
}

fn float_bound(bound: Option<f64>) -> Value {
    bound
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}
