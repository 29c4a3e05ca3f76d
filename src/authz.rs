//! Delegated authorization.
//!
//! Whether an identity may perform an action is decided by an [`Authorizer`],
//! usually a remote policy service. A denial and a failure to reach the
//! authorizer look the same to the caller: a permission error (403).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;

use crate::auth::Identity;
use crate::error::Error;
use crate::logging::RequestLog;

/// Answers permission questions.
pub trait Authorizer: Send + Sync {
    /// Decides whether `identity` may perform `action` on `data`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] if no decision could be obtained.
    fn authorize(
        &self,
        identity: Option<&Identity>,
        action: &str,
        data: &Value,
    ) -> Result<bool, AuthorizationError>;
}

/// The authorizer could not produce a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    reason: String,
}

impl AuthorizationError {
    /// Creates an authorization error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authorization check failed: {}", self.reason)
    }
}

impl std::error::Error for AuthorizationError {}

/// Static in-process authorizer keyed by identity email.
///
/// Anonymous callers are always denied.
///
/// # Examples
///
/// ```
/// use api_forms::{AllowList, Authorizer, Identity};
/// use serde_json::Value;
///
/// let allow = AllowList::new().allow("ann@example.com", "orders:delete");
/// let ann = Identity::new("ann@example.com");
///
/// assert_eq!(allow.authorize(Some(&ann), "orders:delete", &Value::Null), Ok(true));
/// assert_eq!(allow.authorize(Some(&ann), "orders:create", &Value::Null), Ok(false));
/// assert_eq!(allow.authorize(None, "orders:delete", &Value::Null), Ok(false));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    grants: BTreeMap<String, BTreeSet<String>>,
}

impl AllowList {
    /// Creates an empty allow-list that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `action` to the identity with `email`.
    pub fn allow(mut self, email: impl Into<String>, action: impl Into<String>) -> Self {
        self.grants
            .entry(email.into())
            .or_default()
            .insert(action.into());
        self
    }
}

impl Authorizer for AllowList {
    fn authorize(
        &self,
        identity: Option<&Identity>,
        action: &str,
        _data: &Value,
    ) -> Result<bool, AuthorizationError> {
        Ok(identity
            .and_then(|identity| self.grants.get(&identity.email))
            .is_some_and(|actions| actions.contains(action)))
    }
}

/// Runs a permission check, turning denial and authorizer failure alike into
/// [`Error::Permission`].
pub(crate) fn check(
    authorizer: &dyn Authorizer,
    identity: Option<&Identity>,
    action: &str,
    data: &Value,
    log: RequestLog<'_>,
) -> Result<(), Error> {
    let user = identity.map(|identity| identity.email.as_str());

    match authorizer.authorize(identity, action, data) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::permission_denied(user, Some(action))),
        Err(err) => {
            log.warn(format_args!("{err}"));
            Err(Error::permission_denied(user, Some(action)))
        }
    }
}
