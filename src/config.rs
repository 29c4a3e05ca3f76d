use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::secret::Secret;

/// Header the token is read from unless configured otherwise.
pub const DEFAULT_TOKEN_HEADER: &str = "Authenticate";

fn default_token_header() -> String {
    DEFAULT_TOKEN_HEADER.to_string()
}

/// Key material used to verify token signatures.
///
/// Deserializes from `{"algorithm": "RS256", "key": "<pem>"}` or
/// `{"algorithm": "HS256", "key": "<shared secret>"}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "algorithm", content = "key")]
pub enum VerifierKey {
    /// RSA public key (or certificate key) in PEM form, verified as RS256
    #[serde(rename = "RS256")]
    Rs256Pem(Secret<String>),
    /// Shared secret, verified as HS256
    #[serde(rename = "HS256")]
    Hs256(Secret<String>),
}

/// Configuration for [`JwtVerifier`](crate::JwtVerifier).
///
/// # Examples
///
/// ```
/// use api_forms::{AuthConfig, VerifierKey};
///
/// let config: AuthConfig = serde_json::from_str(r#"{
///     "key": {"algorithm": "HS256", "key": "shared-secret"},
///     "audience": "my-project"
/// }"#).unwrap();
///
/// assert_eq!(config.token_header, "Authenticate");
/// assert!(matches!(config.key, VerifierKey::Hs256(_)));
/// // Key material never shows up in debug output
/// assert!(!format!("{config:?}").contains("shared-secret"));
/// ```
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Verification key
    pub key: VerifierKey,
    /// Expected `aud` claim
    pub audience: String,
    /// Request header carrying the token
    #[serde(default = "default_token_header")]
    pub token_header: String,
}

impl AuthConfig {
    /// Creates an RS256 configuration from a PEM key.
    pub fn rs256(pem: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            key: VerifierKey::Rs256Pem(Secret::new(pem.into())),
            audience: audience.into(),
            token_header: default_token_header(),
        }
    }

    /// Creates an HS256 configuration from a shared secret.
    pub fn hs256(secret: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            key: VerifierKey::Hs256(Secret::new(secret.into())),
            audience: audience.into(),
            token_header: default_token_header(),
        }
    }

    /// Creates an RS256 configuration from a base64-encoded PEM, the form in
    /// which certificates are usually passed through environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the input is not base64 or does not decode to
    /// UTF-8 text.
    pub fn from_base64_pem(encoded: &str, audience: impl Into<String>) -> Result<Self, ConfigError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| ConfigError::InvalidBase64(err.to_string()))?;
        let pem = String::from_utf8(bytes).map_err(|_| ConfigError::InvalidUtf8)?;
        Ok(Self::rs256(pem, audience))
    }

    /// Reads the token from a different header.
    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        self.token_header = header.into();
        self
    }
}

/// Invalid verifier configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Encoded key material was not valid base64
    InvalidBase64(String),
    /// Decoded key material was not UTF-8 text
    InvalidUtf8,
    /// Key material was rejected by the token library
    InvalidKey(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBase64(reason) => write!(f, "key is not valid base64: {reason}"),
            ConfigError::InvalidUtf8 => write!(f, "decoded key is not valid UTF-8"),
            ConfigError::InvalidKey(reason) => write!(f, "invalid verification key: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";

    #[test]
    fn base64_pem_is_decoded() {
        let encoded = STANDARD.encode(PEM);
        let config = AuthConfig::from_base64_pem(&encoded, "aud-1").unwrap();

        match &config.key {
            VerifierKey::Rs256Pem(pem) => assert_eq!(pem.expose_secret(), PEM),
            other => panic!("unexpected key {other:?}"),
        }
        assert_eq!(config.audience, "aud-1");
        assert_eq!(config.token_header, DEFAULT_TOKEN_HEADER);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = AuthConfig::from_base64_pem("not base64!!", "aud").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBase64(_)));
    }

    #[test]
    fn non_utf8_key_is_rejected() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0xfd]);
        let err = AuthConfig::from_base64_pem(&encoded, "aud").unwrap_err();
        assert_eq!(err, ConfigError::InvalidUtf8);
    }

    #[test]
    fn config_deserializes_with_custom_header() {
        let config: AuthConfig = serde_json::from_str(
            r#"{"key": {"algorithm": "RS256", "key": "pem"}, "audience": "a", "token_header": "X-Token"}"#,
        )
        .unwrap();

        assert!(matches!(config.key, VerifierKey::Rs256Pem(_)));
        assert_eq!(config.token_header, "X-Token");
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let config = AuthConfig::hs256("super-secret", "aud").with_token_header("X-Auth");
        let debug = format!("{config:?}");

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("X-Auth"));
    }
}
