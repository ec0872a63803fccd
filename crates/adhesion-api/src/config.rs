//! Runtime server configuration, deserialised from `config.toml` layered with
//! `ADHESION_*` environment variables.

use std::{fmt, path::PathBuf};

use adhesion_core::{
  Error, Result, currency::RateTable, identity::IdentityConfig,
  instructions::DuesConfig,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub identity:   IdentityConfig,
  pub auth:       AuthConfig,
  #[serde(default)]
  pub dues:       DuesConfig,
  #[serde(default)]
  pub rates:      RateTable,
}

/// Secrets backing the session and administrator guards.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub admin_secret_hash: String,
  /// HMAC key for HS256 session tokens.
  pub session_secret:    String,
  #[serde(default = "default_issuer")]
  pub session_issuer:    String,
  #[serde(default = "default_session_ttl_hours")]
  pub session_ttl_hours: i64,
}

impl fmt::Debug for AuthConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AuthConfig")
      .field("admin_secret_hash", &"<redacted>")
      .field("session_secret", &"<redacted>")
      .field("session_issuer", &self.session_issuer)
      .field("session_ttl_hours", &self.session_ttl_hours)
      .finish()
  }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("adhesion.db") }
fn default_issuer() -> String { "adhesion".to_string() }
fn default_session_ttl_hours() -> i64 { 24 }

impl ServerConfig {
  /// Reject configurations the server cannot run safely with.
  pub fn validate(&self) -> Result<()> {
    if self.identity.prefix.trim().is_empty() {
      return Err(Error::validation("identity.prefix", "must not be empty"));
    }
    if self.identity.credential_key.is_empty() {
      return Err(Error::validation("identity.credential_key", "must not be empty"));
    }
    if self.auth.session_secret.is_empty() {
      return Err(Error::validation("auth.session_secret", "must not be empty"));
    }
    if self.auth.admin_secret_hash.is_empty() {
      return Err(Error::validation(
        "auth.admin_secret_hash",
        "must not be empty; generate one with --hash-secret",
      ));
    }
    if self.auth.session_ttl_hours <= 0 {
      return Err(Error::validation("auth.session_ttl_hours", "must be positive"));
    }
    self.rates.validate()
  }
}
