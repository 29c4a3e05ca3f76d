use std::fmt;

use serde::{Deserialize, Deserializer};

/// A wrapper that keeps key material out of logs.
///
/// `Secret<T>` holds verifier keys and shared secrets loaded through
/// [`AuthConfig`](crate::AuthConfig). The wrapped value can only be accessed
/// through the explicit [`expose_secret`](Self::expose_secret) method.
///
/// # Security Properties
///
/// - Does NOT implement `Deref`, `AsRef`, `Borrow`, `Clone`, or `Copy`
/// - Debug and Display output is always `[REDACTED]`
/// - No type information is leaked in formatted output
///
/// # Examples
///
/// ```
/// use api_forms::Secret;
///
/// let key = Secret::new("hs256-shared-secret".to_string());
///
/// println!("{:?}", key); // Prints: [REDACTED]
/// println!("{}", key);   // Prints: [REDACTED]
///
/// assert_eq!(key.expose_secret(), "hs256-shared-secret");
/// ```
// BREAKING CHANGE WARNING: Do NOT add Clone, Copy, or Default derives.
pub struct Secret<T> {
    // BREAKING CHANGE WARNING: This field MUST remain private (CWE-532).
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value in a `Secret`.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// # Security Warning
    ///
    /// Ensure the exposed value is not logged or displayed.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    /// BREAKING CHANGE WARNING: This MUST unconditionally return "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    /// BREAKING CHANGE WARNING: This MUST unconditionally return "[REDACTED]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// BREAKING CHANGE WARNING: Do NOT add a Serialize impl.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret::new)
    }
}
