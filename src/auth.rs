//! Caller authentication.
//!
//! A handler with a [`TokenVerifier`] attached runs it before anything else.
//! Every verifier failure is reported to the caller as `authentication error`
//! with status 401; the [`AuthError`] cause only reaches the logs.

use std::collections::HashSet;
use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::config::{AuthConfig, ConfigError, VerifierKey};
use crate::request::Request;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Verified email address
    pub email: String,
    /// All claims carried by the token
    pub claims: Map<String, Value>,
}

impl Identity {
    /// Creates an identity with no extra claims.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            claims: Map::new(),
        }
    }
}

/// Why a caller could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token in the request
    MissingToken,
    /// The token signature did not verify
    InvalidSignature,
    /// The token was malformed, expired, or issued for another audience
    InvalidToken(String),
    /// The token's email has not been verified by the issuer
    EmailNotVerified,
    /// The token carries no email
    MissingEmail,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "no token in the request"),
            AuthError::InvalidSignature => write!(f, "token signature is invalid"),
            AuthError::InvalidToken(reason) => write!(f, "invalid token: {reason}"),
            AuthError::EmailNotVerified => write!(f, "email is not verified"),
            AuthError::MissingEmail => write!(f, "token carries no email"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Establishes the caller's identity from a request.
pub trait TokenVerifier: Send + Sync {
    /// Verifies the request's credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the caller cannot be authenticated.
    fn verify(&self, request: &Request) -> Result<Identity, AuthError>;
}

/// Verifies signed JWTs carried in a request header.
///
/// The token must verify against the configured key, name the configured
/// audience, and carry `email_verified: true` plus a non-empty `email`.
/// `exp` is validated when present.
///
/// # Examples
///
/// ```
/// use api_forms::{AuthConfig, AuthError, JwtVerifier, Method, Request, TokenVerifier};
///
/// let verifier = JwtVerifier::new(&AuthConfig::hs256("shared-secret", "my-project")).unwrap();
///
/// let request = Request::new("req-1", Method::Get);
/// assert_eq!(verifier.verify(&request), Err(AuthError::MissingToken));
/// ```
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    token_header: String,
}

impl JwtVerifier {
    /// Builds a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM key cannot be parsed.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        let (key, algorithm) = match &config.key {
            VerifierKey::Rs256Pem(pem) => (
                DecodingKey::from_rsa_pem(pem.expose_secret().as_bytes())
                    .map_err(|err| ConfigError::InvalidKey(err.to_string()))?,
                Algorithm::RS256,
            ),
            VerifierKey::Hs256(secret) => (
                DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                Algorithm::HS256,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&config.audience]);
        validation.required_spec_claims = HashSet::from(["aud".to_string()]);

        Ok(Self {
            key,
            validation,
            token_header: config.token_header.clone(),
        })
    }
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("key", &"[REDACTED]")
            .field("algorithms", &self.validation.algorithms)
            .field("token_header", &self.token_header)
            .finish()
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, request: &Request) -> Result<Identity, AuthError> {
        let token = request
            .header(&self.token_header)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation).map_err(
            |err| match err.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(err.to_string()),
            },
        )?;
        let claims = data.claims;

        if claims.get("email_verified") != Some(&Value::Bool(true)) {
            return Err(AuthError::EmailNotVerified);
        }

        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .filter(|email| !email.is_empty())
            .ok_or(AuthError::MissingEmail)?
            .to_string();

        Ok(Identity { email, claims })
    }
}
