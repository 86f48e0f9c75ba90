//! Session tokens and their JWT claims.
//!
//! The client never holds the signing secret, so claims are read without
//! signature verification; they are used for display (who, until when) only.
//! The server stays the authority on validity.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::AuthLoginResponse;

/// The one active authenticated session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl From<AuthLoginResponse> for Session {
    fn from(response: AuthLoginResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: Some(response.refresh_token).filter(|token| !token.is_empty()),
        }
    }
}

impl Session {
    pub fn claims(&self) -> ApiResult<TokenClaims> {
        peek_claims(&self.access_token)
    }
}

/// Claims the garden API puts in access and refresh tokens
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String, // user id
    #[serde(default)]
    pub exp: Option<i64>,
    /// `access_token` or `refresh_token`
    #[serde(default)]
    pub typ: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| at <= now).unwrap_or(false)
    }

    pub fn is_refresh(&self) -> bool {
        self.typ.as_deref() == Some("refresh_token")
    }
}

/// Decodes token claims without checking the signature or expiry.
pub fn peek_claims(token: &str) -> ApiResult<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| ApiError::Decode(format!("malformed token: {e}")))?;
    Ok(data.claims)
}
