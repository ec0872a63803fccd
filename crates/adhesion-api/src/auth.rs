//! Member-session and administrator extractors.
//!
//! Members authenticate with `Authorization: Bearer <JWT>` (HS256, `sub` is
//! the account id). Administrators send the shared secret in
//! `X-Admin-Secret`; it is checked against an argon2 hash from config.

use adhesion_core::store::MembershipStore;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, config::AuthConfig, error::ApiError};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Claims carried by a member session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  /// Account id of the authenticated member.
  pub sub: String,
  pub iss: String,
  pub iat: i64,
  pub exp: i64,
}

/// Verifies session tokens and the administrator secret.
#[derive(Clone)]
pub struct AccessGuard {
  admin_secret_hash: String,
  issuer:            String,
  session_ttl:       Duration,
  encoding:          EncodingKey,
  decoding:          DecodingKey,
  validation:        Validation,
}

impl AccessGuard {
  pub fn new(config: &AuthConfig) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.session_issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    Self {
      admin_secret_hash: config.admin_secret_hash.clone(),
      issuer:            config.session_issuer.clone(),
      session_ttl:       Duration::hours(config.session_ttl_hours),
      encoding:          EncodingKey::from_secret(config.session_secret.as_bytes()),
      decoding:          DecodingKey::from_secret(config.session_secret.as_bytes()),
      validation,
    }
  }

  /// Mint a session token for `account_id`.
  pub fn issue_session(&self, account_id: &str) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let claims = Claims {
      sub: account_id.to_owned(),
      iss: self.issuer.clone(),
      iat: now.timestamp(),
      exp: (now + self.session_ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
  }

  pub fn verify_session(&self, token: &str) -> Result<Claims, ApiError> {
    let data = decode::<Claims>(token, &self.decoding, &self.validation)
      .map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        ApiError::Unauthorized
      })?;
    if data.claims.sub.trim().is_empty() {
      return Err(ApiError::Unauthorized);
    }
    Ok(data.claims)
  }

  /// Account id from the bearer token in `headers`.
  pub fn session_from_headers(&self, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(ApiError::Unauthorized)?;
    Ok(self.verify_session(token)?.sub)
  }

  /// Missing secret is `Unauthorized`; a wrong one is `Forbidden`.
  pub fn verify_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
    let secret = headers
      .get(ADMIN_SECRET_HEADER)
      .and_then(|v| v.to_str().ok())
      .filter(|v| !v.is_empty())
      .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&self.admin_secret_hash).map_err(|e| {
      tracing::error!(error = %e, "admin_secret_hash is not a valid PHC string");
      ApiError::Forbidden
    })?;

    Argon2::default()
      .verify_password(secret.as_bytes(), &parsed_hash)
      .map_err(|_| {
        tracing::warn!("rejected administrator secret");
        ApiError::Forbidden
      })
  }
}

/// An authenticated member session; holds the account id.
pub struct Session(pub String);

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: MembershipStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    state.guard.session_from_headers(&parts.headers).map(Session)
  }
}

/// Zero-size marker: present in the handler means the caller presented the
/// administrator secret.
pub struct Administrator;

impl<S> FromRequestParts<AppState<S>> for Administrator
where
  S: MembershipStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    state.guard.verify_admin(&parts.headers)?;
    Ok(Administrator)
  }
}
