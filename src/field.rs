//! Typed, constraint-checking fields.
//!
//! A [`Field`] turns one raw JSON value into its canonical form or rejects it
//! with a [`FieldError`]. Fields are built once, never mutated afterwards, and
//! validation is a pure function of the definition and the raw value.

use serde_json::{Map, Number, Value};

use crate::error::FieldError;
use crate::form::Form;

/// Zero-argument constructor for the element field of a list or dict.
///
/// Every constructor on [`Field`] already has this shape, so
/// `Field::list(Field::string)` declares a list of strings.
pub type FieldFactory = fn() -> Field;

/// The closed set of field variants and their type-specific constraints.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Text, with inclusive length bounds counted in characters.
    String {
        /// Shortest accepted length
        min_length: Option<usize>,
        /// Longest accepted length
        max_length: Option<usize>,
    },
    /// Any value, coerced to its truthiness.
    Boolean,
    /// Whole number with inclusive bounds.
    Integer {
        /// Lowest accepted value
        min_value: Option<f64>,
        /// Highest accepted value
        max_value: Option<f64>,
    },
    /// Floating point number with inclusive bounds.
    Float {
        /// Lowest accepted value
        min_value: Option<f64>,
        /// Highest accepted value
        max_value: Option<f64>,
    },
    /// Array whose elements are validated by a fresh element field each.
    List {
        /// Builds the element field
        element: FieldFactory,
        /// Whether an empty array is accepted
        blank: bool,
        /// Accepted element values after coercion
        valid_values: Option<Vec<Value>>,
    },
    /// Object whose values are validated by a fresh element field each.
    Dict {
        /// Builds the element field
        element: FieldFactory,
        /// Whether an empty object is accepted
        blank: bool,
    },
    /// Arbitrary JSON, passed through unchanged.
    Json,
    /// A single nested record.
    Subform(Form),
    /// An array of nested records.
    ListSubform(Form),
    /// An object mapping keys to nested records.
    DictSubform(Form),
}

/// A single typed, constraint-checked value.
///
/// # Examples
///
/// ```
/// use api_forms::Field;
/// use serde_json::json;
///
/// let field = Field::string().min_length(3).max_length(5);
/// assert_eq!(field.validate(&json!("123")).unwrap(), json!("123"));
/// assert!(field.validate(&json!("12")).is_err());
///
/// // Elements are declared by factory, and coerced one by one.
/// let tags = Field::list(Field::string);
/// assert_eq!(tags.validate(&json!(["qw", 123])).unwrap(), json!(["qw", "123"]));
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    help: Option<String>,
    key_map: Option<String>,
}

impl Field {
    fn with_kind(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            help: None,
            key_map: None,
        }
    }

    /// Declares a string field.
    pub fn string() -> Self {
        Self::with_kind(FieldKind::String {
            min_length: None,
            max_length: None,
        })
    }

    /// Declares a boolean field.
    pub fn boolean() -> Self {
        Self::with_kind(FieldKind::Boolean)
    }

    /// Declares an integer field.
    pub fn integer() -> Self {
        Self::with_kind(FieldKind::Integer {
            min_value: None,
            max_value: None,
        })
    }

    /// Declares a floating point field.
    pub fn float() -> Self {
        Self::with_kind(FieldKind::Float {
            min_value: None,
            max_value: None,
        })
    }

    /// Declares a list field whose elements are built by `element`.
    pub fn list(element: FieldFactory) -> Self {
        Self::with_kind(FieldKind::List {
            element,
            blank: true,
            valid_values: None,
        })
    }

    /// Declares a dict field whose values are built by `element`.
    pub fn dict(element: FieldFactory) -> Self {
        Self::with_kind(FieldKind::Dict {
            element,
            blank: true,
        })
    }

    /// Declares a free-form JSON field.
    pub fn json() -> Self {
        Self::with_kind(FieldKind::Json)
    }

    /// Declares a single nested record shaped by `form`.
    pub fn subform(form: impl Into<Form>) -> Self {
        Self::with_kind(FieldKind::Subform(form.into()))
    }

    /// Declares an array of nested records shaped by `form`.
    pub fn list_subform(form: impl Into<Form>) -> Self {
        Self::with_kind(FieldKind::ListSubform(form.into()))
    }

    /// Declares a mapping of nested records shaped by `form`.
    pub fn dict_subform(form: impl Into<Form>) -> Self {
        Self::with_kind(FieldKind::DictSubform(form.into()))
    }

    /// Marks the field as required. A required field never uses its default.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the value substituted when an optional field is absent.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attaches documentation text.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Reads the value from `key` instead of the field name on output.
    pub fn key_map(mut self, key: impl Into<String>) -> Self {
        self.key_map = Some(key.into());
        self
    }

    /// Sets the minimum length of a string field. No effect on other kinds.
    pub fn min_length(mut self, len: usize) -> Self {
        if let FieldKind::String { min_length, .. } = &mut self.kind {
            *min_length = Some(len);
        }
        self
    }

    /// Sets the maximum length of a string field. No effect on other kinds.
    pub fn max_length(mut self, len: usize) -> Self {
        if let FieldKind::String { max_length, .. } = &mut self.kind {
            *max_length = Some(len);
        }
        self
    }

    /// Sets the lower bound of a numeric field. No effect on other kinds.
    pub fn min_value(mut self, value: impl NumericBound) -> Self {
        if let FieldKind::Integer { min_value, .. } | FieldKind::Float { min_value, .. } =
            &mut self.kind
        {
            *min_value = Some(value.to_f64());
        }
        self
    }

    /// Sets the upper bound of a numeric field. No effect on other kinds.
    pub fn max_value(mut self, value: impl NumericBound) -> Self {
        if let FieldKind::Integer { max_value, .. } | FieldKind::Float { max_value, .. } =
            &mut self.kind
        {
            *max_value = Some(value.to_f64());
        }
        self
    }

    /// Controls whether an empty list or dict is accepted. No effect on other kinds.
    pub fn blank(mut self, allowed: bool) -> Self {
        if let FieldKind::List { blank, .. } | FieldKind::Dict { blank, .. } = &mut self.kind {
            *blank = allowed;
        }
        self
    }

    /// Restricts list elements to the given values. No effect on other kinds.
    pub fn valid_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if let FieldKind::List { valid_values, .. } = &mut self.kind {
            *valid_values = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Returns the variant and its constraints.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether the field was declared required.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the declared default, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the documentation text, if any.
    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Returns the key the value is read from on output, falling back to `name`.
    pub fn source_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.key_map.as_deref().unwrap_or(name)
    }

    /// Validates a raw value.
    ///
    /// An absent (`null`) value on an optional field is replaced by the
    /// default. A value that is still absent is returned as `null` without
    /// any checks; whether that is acceptable is decided by the form.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] when coercion or a constraint check fails.
    pub fn validate(&self, raw: &Value) -> Result<Value, FieldError> {
        let value = match (raw, &self.default) {
            (Value::Null, Some(default)) if !self.required => default,
            _ => raw,
        };

        if value.is_null() {
            return Ok(Value::Null);
        }

        self.kind.coerce(value)
    }
}

impl FieldKind {
    /// Coercion, then bounds, then valid values, then elements.
    fn coerce(&self, value: &Value) -> Result<Value, FieldError> {
        match self {
            FieldKind::String {
                min_length,
                max_length,
            } => {
                let text = coerce_string(value);
                let len = text.chars().count();

                if let Some(min) = min_length.filter(|min| len < *min) {
                    return Err(FieldError::new(format!(
                        "the value is shorter than min allowed length [{min}]"
                    )));
                }
                if let Some(max) = max_length.filter(|max| len > *max) {
                    return Err(FieldError::new(format!(
                        "the value is larger than max allowed length [{max}]"
                    )));
                }
                Ok(Value::String(text))
            }
            FieldKind::Boolean => Ok(Value::Bool(is_truthy(value))),
            FieldKind::Integer {
                min_value,
                max_value,
            } => {
                let number = coerce_integer(value)?;
                check_bounds(number as f64, *min_value, *max_value)?;
                Ok(Value::from(number))
            }
            FieldKind::Float {
                min_value,
                max_value,
            } => {
                let number = coerce_float(value)?;
                check_bounds(number, *min_value, *max_value)?;
                Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(FieldError::wrong_type)
            }
            FieldKind::List {
                element,
                blank,
                valid_values,
            } => {
                let items = value.as_array().ok_or_else(FieldError::wrong_type)?;
                let values = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        element().validate(item).map_err(|err| {
                            FieldError::new(format!("invalid element at index {index}: {err}"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                if !blank && values.is_empty() {
                    return Err(FieldError::new("the value is blank"));
                }

                if let Some(allowed) = valid_values {
                    let mut unexpected: Vec<Value> = Vec::new();
                    let is_allowed = |v: &Value| allowed.iter().any(|a| same_value(a, v));
                    for value in values.iter().filter(|v| !is_allowed(v)) {
                        if !unexpected.iter().any(|seen| same_value(seen, value)) {
                            unexpected.push(value.clone());
                        }
                    }
                    if !unexpected.is_empty() {
                        return Err(FieldError::new(format!(
                            "not allowed values: {}",
                            Value::Array(unexpected)
                        )));
                    }
                }

                Ok(Value::Array(values))
            }
            FieldKind::Dict { element, blank } => {
                let entries = value.as_object().ok_or_else(FieldError::wrong_type)?;
                let mut values = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    let validated = element().validate(item).map_err(|err| {
                        FieldError::new(format!("invalid value for key [{key}]: {err}"))
                    })?;
                    values.insert(key.clone(), validated);
                }

                if !blank && values.is_empty() {
                    return Err(FieldError::new("the value is blank"));
                }
                Ok(Value::Object(values))
            }
            FieldKind::Json => Ok(value.clone()),
            FieldKind::Subform(form) => {
                let record = value
                    .as_object()
                    .ok_or_else(|| FieldError::new("expected an object"))?;
                nested_input(form, record).map(Value::Object)
            }
            FieldKind::ListSubform(form) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| FieldError::new("expected a list of objects"))?;
                let mut records = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let record = item.as_object().ok_or_else(|| {
                        FieldError::new(format!("expected an object at index {index}"))
                    })?;
                    records.push(Value::Object(nested_input(form, record)?));
                }
                Ok(Value::Array(records))
            }
            FieldKind::DictSubform(form) => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| FieldError::new("expected a mapping of objects"))?;
                let mut records = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    let record = item.as_object().ok_or_else(|| {
                        FieldError::new(format!("expected an object for key [{key}]"))
                    })?;
                    records.insert(key.clone(), Value::Object(nested_input(form, record)?));
                }
                Ok(Value::Object(records))
            }
        }
    }
}

fn nested_input(form: &Form, record: &Map<String, Value>) -> Result<Map<String, Value>, FieldError> {
    form.process_input(record)
        .map_err(|err| FieldError::new(err.to_string()))
}

/// A number usable as a [`Field::min_value`] or [`Field::max_value`] bound.
///
/// ```
/// use api_forms::Field;
///
/// let floor: i64 = 10;
/// let field = Field::integer().min_value(floor).max_value(99u8);
/// assert!(field.validate(&serde_json::json!(9)).is_err());
/// ```
pub trait NumericBound {
    /// The bound as compared against coerced values.
    fn to_f64(self) -> f64;
}

macro_rules! numeric_bound {
    ($($ty:ty),*) => {
        $(
            impl NumericBound for $ty {
                #[allow(
                    clippy::cast_precision_loss,
                    clippy::cast_lossless,
                    clippy::unnecessary_cast
                )]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

numeric_bound!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Value equality where numbers compare numerically, so `1` equals `1.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Truthiness: empty containers, empty strings, zero and `false` are false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

fn coerce_integer(value: &Value) -> Result<i64, FieldError> {
    match value {
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                Ok(int)
            } else if let Some(uint) = n.as_u64() {
                i64::try_from(uint).map_err(|_| FieldError::wrong_type())
            } else {
                n.as_f64()
                    .and_then(truncate_float)
                    .ok_or_else(FieldError::wrong_type)
            }
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| FieldError::wrong_type()),
        Value::Bool(flag) => Ok(i64::from(*flag)),
        _ => Err(FieldError::wrong_type()),
    }
}

fn truncate_float(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    // i64::MAX is not representable as f64; the cast would saturate.
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

fn coerce_float(value: &Value) -> Result<f64, FieldError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    number
        .filter(|x| x.is_finite())
        .ok_or_else(FieldError::wrong_type)
}

fn check_bounds(value: f64, min: Option<f64>, max: Option<f64>) -> Result<(), FieldError> {
    if let Some(min) = min.filter(|min| value < *min) {
        return Err(FieldError::new(format!(
            "the value is lower than min allowed value [{min}]"
        )));
    }
    if let Some(max) = max.filter(|max| value > *max) {
        return Err(FieldError::new(format!(
            "the value is bigger than max allowed value [{max}]"
        )));
    }
    Ok(())
}
