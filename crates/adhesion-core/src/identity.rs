//! Membership numbers and identity credentials.
//!
//! Numbers come from an atomic counter held by the store; nothing here derives
//! a number from the current row count. Credentials are snapshots: they bind a
//! membership number, a name and a status at the moment of issuance and are
//! only refreshed by an explicit reissue.

use std::{fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
  Error, Result,
  member::MemberStatus,
  store::MembershipStore,
};

/// Counter name used for membership numbers.
pub const MEMBERSHIP_SEQUENCE: &str = "membership_number";

/// Leading tag of every credential; bumped if the payload layout changes.
const CREDENTIAL_VERSION: &str = "ADH1";

/// Leading bytes of the HMAC tag kept in the credential (32 hex characters).
const CHECKSUM_BYTES: usize = 16;

type HmacSha256 = Hmac<Sha256>;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
  /// Leading part of every membership number, e.g. `ADH` in `ADH-000042`.
  pub prefix:         String,
  /// Minimum number of digits; shorter sequences are zero-padded.
  pub width:          usize,
  /// Secret mixed into credential checksums.
  pub credential_key: String,
}

impl Default for IdentityConfig {
  fn default() -> Self {
    Self {
      prefix:         "ADH".to_owned(),
      width:          6,
      credential_key: String::new(),
    }
  }
}

impl fmt::Debug for IdentityConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IdentityConfig")
      .field("prefix", &self.prefix)
      .field("width", &self.width)
      .field("credential_key", &"<redacted>")
      .finish()
  }
}

// ─── Membership numbers ──────────────────────────────────────────────────────

/// `<prefix>-<sequence>`, zero-padded to `width`. Never truncated.
pub fn format_membership_number(prefix: &str, width: usize, sequence: u64) -> String {
  format!("{prefix}-{sequence:0width$}")
}

/// Extract the sequence from a number produced by [`format_membership_number`].
pub fn parse_membership_number(prefix: &str, number: &str) -> Option<u64> {
  let digits = number.strip_prefix(prefix)?.strip_prefix('-')?;
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse().ok()
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// The facts a credential attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
  #[serde(rename = "n")]
  pub membership_number: String,
  #[serde(rename = "f")]
  pub full_name:         String,
  #[serde(rename = "s")]
  pub status:            MemberStatus,
  #[serde(rename = "t")]
  pub issued_at:         DateTime<Utc>,
}

/// Encodes and checks scannable credentials of the form
/// `ADH1.<base64url payload>.<checksum>`.
#[derive(Clone)]
pub struct CredentialIssuer {
  key: Vec<u8>,
}

impl CredentialIssuer {
  pub fn new(key: impl AsRef<[u8]>) -> Self {
    Self { key: key.as_ref().to_vec() }
  }

  pub fn issue(&self, payload: &CredentialPayload) -> Result<String> {
    let body = B64.encode(serde_json::to_vec(payload)?);
    let tag = self.mac(&body)?.finalize().into_bytes();
    let checksum = hex::encode(&tag[..CHECKSUM_BYTES]);
    Ok(format!("{CREDENTIAL_VERSION}.{body}.{checksum}"))
  }

  /// Decode a credential and check that it was issued with this key.
  pub fn verify(&self, credential: &str) -> Result<CredentialPayload> {
    let malformed = || Error::validation("credential", "malformed credential");
    let mismatch = || Error::validation("credential", "checksum mismatch");

    let mut parts = credential.trim().split('.');
    let (Some(version), Some(body), Some(checksum), None) =
      (parts.next(), parts.next(), parts.next(), parts.next())
    else {
      return Err(malformed());
    };
    if version != CREDENTIAL_VERSION {
      return Err(Error::validation(
        "credential",
        format!("unsupported credential version {version:?}"),
      ));
    }

    let tag = hex::decode(checksum).map_err(|_| mismatch())?;
    if tag.len() != CHECKSUM_BYTES {
      return Err(mismatch());
    }
    self
      .mac(body)?
      .verify_truncated_left(&tag)
      .map_err(|_| mismatch())?;

    let bytes = B64.decode(body).map_err(|_| malformed())?;
    serde_json::from_slice(&bytes).map_err(|_| malformed())
  }

  /// HMAC-SHA256 over `ADH1.<body>`.
  fn mac(&self, body: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(&self.key)
      .map_err(|_| Error::validation("credential_key", "unusable key length"))?;
    mac.update(CREDENTIAL_VERSION.as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Ok(mac)
  }
}

// ─── Allocator ───────────────────────────────────────────────────────────────

/// Hands out membership numbers and issues credentials.
pub struct IdentityAllocator<S> {
  store:  Arc<S>,
  config: IdentityConfig,
  issuer: CredentialIssuer,
}

impl<S> Clone for IdentityAllocator<S> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      config: self.config.clone(),
      issuer: self.issuer.clone(),
    }
  }
}

impl<S: MembershipStore> IdentityAllocator<S> {
  pub fn new(store: Arc<S>, config: IdentityConfig) -> Self {
    let issuer = CredentialIssuer::new(&config.credential_key);
    Self { store, config, issuer }
  }

  pub fn config(&self) -> &IdentityConfig { &self.config }

  /// Take the next value of the membership counter and format it.
  pub async fn allocate(&self) -> Result<String> {
    let sequence = self
      .store
      .next_sequence(MEMBERSHIP_SEQUENCE)
      .await
      .map_err(Error::store)?;
    Ok(format_membership_number(
      &self.config.prefix,
      self.config.width,
      sequence,
    ))
  }

  /// Issue a credential binding the three inputs as of now.
  pub fn issue_credential(
    &self,
    membership_number: &str,
    full_name: &str,
    status: MemberStatus,
  ) -> Result<(String, DateTime<Utc>)> {
    let issued_at = Utc::now();
    let credential = self.issuer.issue(&CredentialPayload {
      membership_number: membership_number.to_owned(),
      full_name:         full_name.to_owned(),
      status,
      issued_at,
    })?;
    Ok((credential, issued_at))
  }

  pub fn verify_credential(&self, credential: &str) -> Result<CredentialPayload> {
    self.issuer.verify(credential)
  }
}
