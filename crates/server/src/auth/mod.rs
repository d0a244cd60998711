//! Credential verification.
//!
//! A credential is a signed token carrying the caller's id, email and
//! display name. It reaches the server either in the `auth_token` cookie or
//! as a bearer header; the cookie wins when both are present. Verification
//! is stateless: nothing is retained between calls.

pub mod middleware;

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use headers::HeaderMapExt;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cookie that carries the credential.
pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Resolved caller identity. Downstream code receives this, never the raw token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

/// Issues and verifies signed credentials against a single shared secret.
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenVerifier {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        // No leeway: an expired credential is expired.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Mint a credential for a verified account.
    pub fn issue(&self, user_id: &str, email: &str, display_name: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: display_name.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("failed to sign credential: {e}")))
    }

    /// Verify a credential and resolve the caller identity.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data =
            decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => Error::Expired,
                    _ => Error::Unauthenticated,
                }
            })?;

        Ok(Identity {
            user_id: data.claims.sub,
            email: data.claims.email,
            display_name: data.claims.name,
        })
    }
}

/// Pull the credential out of the request headers.
///
/// Cookie first, then `Authorization: Bearer`. Returns `None` when neither
/// channel presents one.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = headers.typed_get::<headers::Cookie>() {
        if let Some(token) = cookie.get(AUTH_COOKIE) {
            return Some(token.to_string());
        }
    }

    let auth = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ").map(|t| t.trim().to_string())
}
