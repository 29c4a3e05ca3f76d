use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Error;

/// The response envelope.
///
/// Serializes as `{"status": "OK", "body": ...}` or
/// `{"status": "FAIL", "status_code": ..., "reason": ...}`.
///
/// # Examples
///
/// ```
/// use api_forms::Response;
/// use serde_json::json;
///
/// let ok = Response::ok(json!({"id": 1}));
/// assert_eq!(ok.to_value(), json!({"status": "OK", "body": {"id": 1}}));
///
/// let fail = Response::fail(400, "email is required");
/// assert_eq!(
///     serde_json::to_value(&fail).unwrap(),
///     json!({"status": "FAIL", "status_code": 400, "reason": "email is required"})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    /// The request succeeded.
    #[serde(rename = "OK")]
    Ok {
        /// Processed output
        body: Value,
    },
    /// The request failed.
    #[serde(rename = "FAIL")]
    Fail {
        /// Status code of the failure category
        status_code: u16,
        /// Caller-visible reason
        reason: String,
    },
}

impl Response {
    /// Creates a success envelope.
    pub fn ok(body: Value) -> Self {
        Response::Ok { body }
    }

    /// Creates a failure envelope.
    pub fn fail(status_code: u16, reason: impl Into<String>) -> Self {
        Response::Fail {
            status_code,
            reason: reason.into(),
        }
    }

    /// Renders an error for the caller: its category's status code and public
    /// reason, never the internal detail.
    pub fn from_error(err: &Error) -> Self {
        Self::fail(err.category().status_code(), err.public_reason())
    }

    /// Returns `true` for a success envelope.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }

    /// Returns 200 for success, otherwise the failure's status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Response::Ok { .. } => 200,
            Response::Fail { status_code, .. } => *status_code,
        }
    }

    /// Returns the envelope as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Response::Ok { body } => json!({"status": "OK", "body": body}),
            Response::Fail {
                status_code,
                reason,
            } => json!({"status": "FAIL", "status_code": status_code, "reason": reason}),
        }
    }
}

impl From<&Error> for Response {
    fn from(err: &Error) -> Self {
        Self::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn success_envelope() {
        let response = Response::ok(json!([1, 2]));

        assert!(response.is_ok());
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.to_value(), json!({"status": "OK", "body": [1, 2]}));
    }

    #[test]
    fn serde_matches_to_value() {
        for response in [Response::ok(json!({"a": null})), Response::fail(403, "no")] {
            assert_eq!(serde_json::to_value(&response).unwrap(), response.to_value());

            let back: Response = serde_json::from_value(response.to_value()).unwrap();
            assert_eq!(back, response);
        }
    }

    #[test]
    fn errors_render_public_reasons_only() {
        let cases = [
            (Error::required("email"), 400, "email is required"),
            (Error::from(AuthError::InvalidSignature), 401, "authentication error"),
            (
                Error::permission_denied(Some("u@x.io"), Some("drop")),
                403,
                "permission denied for the user [u@x.io] to perform the action [drop]",
            ),
            (Error::server("invalid value [age=1] too low"), 500, "server error"),
            (Error::unexpected("db password rejected"), 500, "server error"),
        ];

        for (err, status, reason) in cases {
            let response = Response::from(&err);
            assert_eq!(response, Response::fail(status, reason));
            assert_eq!(response.status_code(), status);
            assert!(!response.is_ok());
        }
    }
}
