use std::fmt;

/// A decoded request payload that no form has validated yet.
///
/// The decoding stage of the pipeline wraps whatever it extracted from the
/// query string or body in `Tainted`. Business logic never sees it: the only
/// way to open the wrapper is [`InputForm::process_tainted`], which returns
/// canonical values or an input error.
///
/// # Security Properties
///
/// - Does NOT implement `Deref` or any implicit conversion traits
/// - The inner value is only reachable from inside this crate
///
/// # Examples
///
/// ```
/// use api_forms::{Field, Form, InputForm, Tainted};
/// use serde_json::{json, Map};
///
/// let mut raw = Map::new();
/// raw.insert("age".into(), json!("41"));
/// let payload = Tainted::new(raw);
///
/// // let age = payload["age"]; // Won't compile: no Deref, no Index
///
/// let form = InputForm::new(Form::new().field("age", Field::integer()));
/// let processed = form.process_tainted(payload).unwrap();
/// assert_eq!(processed["age"], json!(41));
/// ```
///
/// [`InputForm::process_tainted`]: crate::InputForm::process_tainted
// BREAKING CHANGE WARNING: Do NOT remove Clone - a payload may be validated by more than one form.
#[derive(Clone)]
pub struct Tainted<T> {
    // BREAKING CHANGE WARNING: This field MUST remain private.
    // Making it public lets unvalidated input reach business logic (CWE-20).
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Extracts the inner value for validation.
    ///
    /// Only input forms may call this, and only to validate the value.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

// BREAKING CHANGE WARNING: Do NOT add Deref, AsRef, Borrow, Index, From<T>, Into<T>, or any other
// implicit conversion traits to Tainted<T>.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}
