//! Error types for `adhesion-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A required field is missing or malformed.
  #[error("invalid {field}: {message}")]
  Validation {
    field:   &'static str,
    message: String,
  },

  /// The account already owns a profile; carries its membership number.
  #[error("account is already registered as {membership_number}")]
  AlreadyRegistered { membership_number: String },

  /// Lost a race against a concurrent write to the same record.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid transition from {from} to {to}")]
  InvalidTransition {
    from: &'static str,
    to:   &'static str,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation { field, message: message.into() }
  }

  /// Wrap a backend error; used as `.map_err(Error::store)`.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reject empty or whitespace-only values for required text fields.
pub(crate) fn require(field: &'static str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(field, "must not be empty"));
  }
  Ok(())
}
