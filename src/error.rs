use std::fmt;

use serde_json::Value;

use crate::auth::AuthError;

/// Reason returned to callers for every server-side failure.
pub const SERVER_ERROR_REASON: &str = "server error";

/// A single field rejected its raw value.
///
/// `FieldError` is the innermost failure in the crate. It is produced by
/// [`Field::validate`](crate::Field::validate) and is always rewrapped at the
/// form boundary: input forms turn it into [`Error::InvalidValue`], output
/// forms into [`Error::Server`].
///
/// # Examples
///
/// ```
/// use api_forms::Field;
///
/// let err = Field::integer().validate(&"qwe".into()).unwrap_err();
/// assert_eq!(err.reason(), "wrong data type");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    reason: String,
}

impl FieldError {
    /// Creates a field error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The raw value could not be coerced to the declared type.
    pub fn wrong_type() -> Self {
        Self::new("wrong data type")
    }

    /// Returns the human-readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for FieldError {}

/// Errors produced while processing a request.
///
/// Every variant belongs to exactly one [`Category`], which decides the status
/// code and how much of the message a caller is allowed to see.
#[derive(Debug)]
pub enum Error {
    /// A required input field was missing or blank.
    RequiredField {
        /// Name of the missing field
        field: String,
    },
    /// An input field failed coercion or a constraint check.
    InvalidValue {
        /// Name of the offending field
        field: String,
        /// The raw value as received
        value: Value,
        /// Why the field rejected it
        reason: String,
    },
    /// The request payload could not be decoded.
    Decode {
        /// What was wrong with the payload
        reason: String,
    },
    /// The caller is not allowed to perform the action.
    Permission {
        /// Identity that was denied, when known
        user: Option<String>,
        /// Action that was denied, when known
        action: Option<String>,
    },
    /// The caller's identity could not be established.
    Authentication(AuthError),
    /// The handler broke its own contract (e.g. output shape mismatch).
    Server {
        /// Internal description, logged but never returned
        detail: String,
    },
    /// Anything nobody planned for.
    Unexpected {
        /// Internal description, logged but never returned
        detail: String,
    },
}

impl Error {
    /// Creates a required-field error.
    pub fn required(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Wraps a field failure raised on the input path.
    pub fn invalid_value(field: impl Into<String>, value: Value, cause: FieldError) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value,
            reason: cause.reason,
        }
    }

    /// Creates a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Creates a permission error, optionally naming the user and action.
    pub fn permission_denied(user: Option<&str>, action: Option<&str>) -> Self {
        Self::Permission {
            user: user.map(str::to_owned),
            action: action.map(str::to_owned),
        }
    }

    /// Creates a server (contract violation) error.
    pub fn server(detail: impl Into<String>) -> Self {
        Self::Server {
            detail: detail.into(),
        }
    }

    /// Creates an unanticipated error from anything printable.
    pub fn unexpected(detail: impl fmt::Display) -> Self {
        Self::Unexpected {
            detail: detail.to_string(),
        }
    }

    /// Returns the category that governs how this error is reported.
    pub fn category(&self) -> Category {
        match self {
            Error::RequiredField { .. } | Error::InvalidValue { .. } | Error::Decode { .. } => {
                Category::ClientInput
            }
            Error::Permission { .. } => Category::Permission,
            Error::Authentication(_) => Category::Authentication,
            Error::Server { .. } => Category::ServerContract,
            Error::Unexpected { .. } => Category::Unanticipated,
        }
    }

    /// Returns the reason a caller is allowed to see.
    ///
    /// Server-side categories collapse to [`SERVER_ERROR_REASON`].
    ///
    /// # Examples
    ///
    /// ```
    /// use api_forms::Error;
    ///
    /// assert_eq!(Error::required("email").public_reason(), "email is required");
    /// assert_eq!(Error::server("age=1 below min_value").public_reason(), "server error");
    /// ```
    pub fn public_reason(&self) -> String {
        if self.category().exposes_detail() {
            self.to_string()
        } else {
            SERVER_ERROR_REASON.to_string()
        }
    }

    /// Returns the full internal description, for logs only.
    pub fn log_detail(&self) -> String {
        match self {
            Error::Authentication(cause) => format!("authentication error: {cause}"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RequiredField { field } => write!(f, "{field} is required"),
            Error::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(f, "invalid value [{field}={}]", DisplayValue(value))?;
                if !reason.is_empty() {
                    write!(f, " {reason}")?;
                }
                Ok(())
            }
            Error::Decode { reason } => write!(f, "malformed request: {reason}"),
            Error::Permission { user, action } => {
                f.write_str("permission denied")?;
                if let Some(user) = user {
                    write!(f, " for the user [{user}]")?;
                }
                if let Some(action) = action {
                    write!(f, " to perform the action [{action}]")?;
                }
                Ok(())
            }
            Error::Authentication(_) => f.write_str("authentication error"),
            Error::Server { detail } => write!(f, "server error: {detail}"),
            Error::Unexpected { detail } => write!(f, "unexpected error: {detail}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Authentication(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<AuthError> for Error {
    fn from(cause: AuthError) -> Self {
        Error::Authentication(cause)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::unexpected(err)
    }
}

/// Failure categories, each mapped to one transport status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Privilege denial (403)
    Permission,
    /// Identity could not be established (401)
    Authentication,
    /// Bad request data (400)
    ClientInput,
    /// Handler output broke its declared contract (500)
    ServerContract,
    /// Anything else (500)
    Unanticipated,
}

impl Category {
    /// Returns the status code reported for this category.
    pub fn status_code(self) -> u16 {
        match self {
            Category::Permission => 403,
            Category::Authentication => 401,
            Category::ClientInput => 400,
            Category::ServerContract | Category::Unanticipated => 500,
        }
    }

    /// Whether the error message may be shown to the caller.
    pub fn exposes_detail(self) -> bool {
        !matches!(self, Category::ServerContract | Category::Unanticipated)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Permission => write!(f, "permission"),
            Category::Authentication => write!(f, "authentication"),
            Category::ClientInput => write!(f, "client input"),
            Category::ServerContract => write!(f, "server contract"),
            Category::Unanticipated => write!(f, "unanticipated"),
        }
    }
}

/// Renders a JSON value the way it appears in error messages: strings bare,
/// everything else as compact JSON.
pub(crate) struct DisplayValue<'a>(pub(crate) &'a Value);

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_field_names_the_field() {
        assert_eq!(Error::required("email").to_string(), "email is required");
    }

    #[test]
    fn invalid_value_renders_field_and_raw_value() {
        let err = Error::invalid_value(
            "email",
            json!("1234"),
            FieldError::new("the value is shorter than min allowed length [5]"),
        );

        assert_eq!(
            err.to_string(),
            "invalid value [email=1234] the value is shorter than min allowed length [5]"
        );
    }

    #[test]
    fn invalid_value_without_reason_has_no_trailing_space() {
        let err = Error::invalid_value("age", json!(1), FieldError::new(""));
        assert_eq!(err.to_string(), "invalid value [age=1]");
    }

    #[test]
    fn permission_message_includes_known_parts() {
        let full = Error::permission_denied(Some("a@b.com"), Some("delete"));
        assert_eq!(
            full.to_string(),
            "permission denied for the user [a@b.com] to perform the action [delete]"
        );

        let bare = Error::permission_denied(None, None);
        assert_eq!(bare.to_string(), "permission denied");
    }

    #[test]
    fn authentication_message_hides_the_cause() {
        let err = Error::from(AuthError::EmailNotVerified);

        assert_eq!(err.to_string(), "authentication error");
        assert_eq!(err.public_reason(), "authentication error");
        assert!(err.log_detail().contains("not verified"));
    }

    #[test]
    fn categories_map_to_fixed_status_codes() {
        let cases = [
            (Error::permission_denied(None, None), 403),
            (Error::from(AuthError::MissingToken), 401),
            (Error::required("x"), 400),
            (Error::invalid_value("x", Value::Null, FieldError::wrong_type()), 400),
            (Error::decode("bad json"), 400),
            (Error::server("shape"), 500),
            (Error::unexpected("boom"), 500),
        ];

        for (err, status) in cases {
            assert_eq!(err.category().status_code(), status, "{err}");
        }
    }

    #[test]
    fn server_side_errors_never_expose_detail() {
        let server = Error::server("invalid value [age=1] min_value");
        let unexpected = Error::unexpected("database password rejected");

        assert_eq!(server.public_reason(), SERVER_ERROR_REASON);
        assert_eq!(unexpected.public_reason(), SERVER_ERROR_REASON);
        assert!(server.log_detail().contains("min_value"));
        assert!(unexpected.log_detail().contains("password"));
    }

    #[test]
    fn display_value_renders_strings_bare() {
        assert_eq!(DisplayValue(&json!("qwe")).to_string(), "qwe");
        assert_eq!(DisplayValue(&json!(12)).to_string(), "12");
        assert_eq!(DisplayValue(&json!(["a", 1])).to_string(), r#"["a",1]"#);
    }
}
