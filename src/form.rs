//! Ordered collections of fields and their two processing roles.
//!
//! A [`Form`] is only a schema. It is used either as an [`InputForm`], which
//! turns untrusted request data into canonical values and enforces
//! `required`, or as an [`OutputForm`], which shapes whatever the business
//! logic produced for emission and treats any mismatch as a server fault.

use serde_json::{Map, Value};

use crate::error::{DisplayValue, Error};
use crate::field::{Field, FieldKind};
use crate::tainted::Tainted;

/// An ordered sequence of uniquely named fields.
///
/// Declaration order is preserved in processed records and in generated
/// documentation. Fields are independent of each other.
///
/// # Examples
///
/// ```
/// use api_forms::{Field, Form};
///
/// let form = Form::new()
///     .field("email", Field::string().required())
///     .field("age", Field::integer());
///
/// let names: Vec<&str> = form.fields().map(|(name, _)| name).collect();
/// assert_eq!(names, ["email", "age"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Form {
    fields: Vec<(String, Field)>,
}

impl Form {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declares a field. Redeclaring a name replaces the earlier field in place.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    /// Iterates the declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, field)| field)
    }

    /// Returns the number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Input role: required check, then validation, stopping at the first
    /// failing field in declaration order.
    pub(crate) fn process_input(
        &self,
        record: &Map<String, Value>,
    ) -> Result<Map<String, Value>, Error> {
        let mut processed = Map::with_capacity(self.fields.len());

        for (name, field) in &self.fields {
            let raw = record.get(name).unwrap_or(&Value::Null);

            if field.is_required() && is_missing(raw) {
                return Err(Error::required(name.as_str()));
            }

            let value = field
                .validate(raw)
                .map_err(|cause| Error::invalid_value(name.as_str(), raw.clone(), cause))?;
            processed.insert(name.clone(), value);
        }

        Ok(processed)
    }

    /// Output role: `key_map` lookup, subforms first, every failure is a
    /// server error.
    pub(crate) fn process_output(
        &self,
        record: &Map<String, Value>,
    ) -> Result<Map<String, Value>, Error> {
        let mut processed = Map::with_capacity(self.fields.len());

        for (name, field) in &self.fields {
            let key = field.source_key(name);
            let raw = record.get(key).unwrap_or(&Value::Null);

            let value = match field.kind() {
                FieldKind::Subform(form) => match raw {
                    Value::Null => Value::Null,
                    Value::Object(nested) => Value::Object(form.process_output(nested)?),
                    other => return Err(shape_error(key, other, "an object")),
                },
                FieldKind::ListSubform(form) => match raw {
                    Value::Null => Value::Array(Vec::new()),
                    Value::Array(items) => {
                        let mut records = Vec::with_capacity(items.len());
                        for item in items {
                            let nested = item
                                .as_object()
                                .ok_or_else(|| shape_error(key, item, "a list of objects"))?;
                            records.push(Value::Object(form.process_output(nested)?));
                        }
                        Value::Array(records)
                    }
                    other => return Err(shape_error(key, other, "a list of objects")),
                },
                FieldKind::DictSubform(form) => match raw {
                    Value::Null => Value::Null,
                    Value::Object(entries) => {
                        let mut records = Map::with_capacity(entries.len());
                        for (entry_key, item) in entries {
                            let nested = item
                                .as_object()
                                .ok_or_else(|| shape_error(key, item, "a mapping of objects"))?;
                            records.insert(
                                entry_key.clone(),
                                Value::Object(form.process_output(nested)?),
                            );
                        }
                        Value::Object(records)
                    }
                    other => return Err(shape_error(key, other, "a mapping of objects")),
                },
                _ => field.validate(raw).map_err(|cause| {
                    Error::server(format!(
                        "invalid value [{key}={}] {cause}",
                        DisplayValue(raw)
                    ))
                })?,
            };

            processed.insert(name.clone(), value);
        }

        Ok(processed)
    }
}

fn shape_error(key: &str, value: &Value, expected: &str) -> Error {
    Error::server(format!(
        "invalid value [{key}={}] expected {expected}",
        DisplayValue(value)
    ))
}

/// A required value counts as missing when it is absent, `null`, or an empty
/// string, list or object. Numbers and booleans are always present.
pub(crate) fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Validates external data into canonical form.
///
/// # Examples
///
/// ```
/// use api_forms::{Field, Form, InputForm};
/// use serde_json::json;
///
/// let form = InputForm::new(
///     Form::new()
///         .field("email", Field::string().required())
///         .field("age", Field::integer()),
/// );
///
/// let raw = json!({"email": "a@b.com"});
/// let processed = form.process(raw.as_object().unwrap()).unwrap();
/// assert_eq!(serde_json::Value::Object(processed), json!({"email": "a@b.com", "age": null}));
///
/// let err = form.process(json!({"age": 2}).as_object().unwrap()).unwrap_err();
/// assert_eq!(err.to_string(), "email is required");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputForm {
    form: Form,
}

impl InputForm {
    /// Uses `form` in the input role.
    pub fn new(form: Form) -> Self {
        Self { form }
    }

    /// Returns the underlying schema.
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Validates a raw mapping.
    ///
    /// Every declared field appears in the result; absent optional fields
    /// map to their default or `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequiredField`] or [`Error::InvalidValue`] for the
    /// first failing field in declaration order.
    pub fn process(&self, raw: &Map<String, Value>) -> Result<Map<String, Value>, Error> {
        self.form.process_input(raw)
    }

    /// Validates an untrusted request payload, consuming it.
    ///
    /// This is the only way to read the contents of a [`Tainted`] payload.
    ///
    /// # Errors
    ///
    /// Same as [`process`](Self::process).
    pub fn process_tainted(
        &self,
        raw: Tainted<Map<String, Value>>,
    ) -> Result<Map<String, Value>, Error> {
        self.process(&raw.into_inner())
    }
}

impl From<Form> for InputForm {
    fn from(form: Form) -> Self {
        Self::new(form)
    }
}

impl From<InputForm> for Form {
    fn from(input: InputForm) -> Self {
        input.form
    }
}

/// Shapes internal data for emission.
///
/// Output forms never enforce `required`, read through `key_map`, and report
/// every mismatch as [`Error::Server`]: bad output is the handler's fault,
/// not the caller's.
///
/// # Examples
///
/// ```
/// use api_forms::{Field, Form, OutputForm};
/// use serde_json::json;
///
/// let form = OutputForm::new(Form::new().field("email", Field::string()));
///
/// let one = form.process(&json!({"email": "qwe@gmail.com", "secret": 1})).unwrap();
/// assert_eq!(one, json!({"email": "qwe@gmail.com"}));
///
/// let many = form.process(&json!([{"email": "a@b.c"}, {"email": "d@e.f"}])).unwrap();
/// assert_eq!(many, json!([{"email": "a@b.c"}, {"email": "d@e.f"}]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OutputForm {
    form: Form,
}

impl OutputForm {
    /// Uses `form` in the output role.
    pub fn new(form: Form) -> Self {
        Self { form }
    }

    /// Returns the underlying schema.
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Processes a single record or a list of records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] if `source` is neither an object nor an array
    /// of objects, or if any field rejects its value.
    pub fn process(&self, source: &Value) -> Result<Value, Error> {
        match source {
            Value::Object(record) => self.process_record(record).map(Value::Object),
            Value::Array(records) => records
                .iter()
                .map(|record| match record {
                    Value::Object(record) => self.process_record(record).map(Value::Object),
                    other => Err(Error::server(format!(
                        "output records must be objects, got {}",
                        DisplayValue(other)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(Error::server(format!(
                "output must be an object or a list of objects, got {}",
                DisplayValue(other)
            ))),
        }
    }

    /// Processes a single record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] if any field rejects its value.
    pub fn process_record(&self, record: &Map<String, Value>) -> Result<Map<String, Value>, Error> {
        self.form.process_output(record)
    }
}

impl From<Form> for OutputForm {
    fn from(form: Form) -> Self {
        Self::new(form)
    }
}

impl From<OutputForm> for Form {
    fn from(output: OutputForm) -> Self {
        output.form
    }
}
