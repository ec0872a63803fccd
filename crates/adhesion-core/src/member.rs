//! Member profiles and the status/role model.
//!
//! A profile is created once per account and never hard-deleted. Members edit
//! their own contact fields; administrators move the profile through the
//! status machine and assign roles.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::require,
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
  Pending,
  Active,
  Suspended,
}

impl MemberStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Active => "active",
      Self::Suspended => "suspended",
    }
  }

  /// The administrative action a transition represents, or `None` if the
  /// transition is not permitted.
  ///
  /// ```text
  /// pending   → active     approve
  /// pending   → suspended  reject
  /// active    → suspended  suspend
  /// suspended → active     reactivate
  /// ```
  pub fn transition_to(self, next: MemberStatus) -> Option<&'static str> {
    match (self, next) {
      (Self::Pending, Self::Active) => Some("approve"),
      (Self::Pending, Self::Suspended) => Some("reject"),
      (Self::Active, Self::Suspended) => Some("suspend"),
      (Self::Suspended, Self::Active) => Some("reactivate"),
      _ => None,
    }
  }

  pub fn can_transition_to(self, next: MemberStatus) -> bool {
    self.transition_to(next).is_some()
  }
}

impl fmt::Display for MemberStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

/// Party role. Orthogonal to status; any role may be assigned at any time.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
  #[default]
  Militant,
  Collecteur,
  Superviseur,
  Administrateur,
}

impl MemberRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Militant => "militant",
      Self::Collecteur => "collecteur",
      Self::Superviseur => "superviseur",
      Self::Administrateur => "administrateur",
    }
  }
}

impl fmt::Display for MemberRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
  pub member_id:            Uuid,
  /// The authenticated account that owns this profile (one profile each).
  pub account_id:           String,
  /// Human-facing identifier; immutable once assigned.
  pub membership_number:    String,
  pub full_name:            String,
  pub national_id:          Option<String>,
  pub commune:              String,
  pub profession:           String,
  pub phone:                String,
  pub email:                Option<String>,
  pub status:               MemberStatus,
  pub role:                 MemberRole,
  /// Status held before the most recent transition. `None` until the first
  /// administrator action.
  pub previous_status:      Option<MemberStatus>,
  pub status_reason:        Option<String>,
  /// Snapshot credential; not refreshed on status changes.
  pub identity_credential:  String,
  pub credential_issued_at: DateTime<Utc>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl MemberProfile {
  /// The public, non-sensitive view of this profile.
  pub fn card(&self) -> MemberCard {
    MemberCard {
      membership_number:   self.membership_number.clone(),
      full_name:           self.full_name.clone(),
      status:              self.status,
      commune:             self.commune.clone(),
      identity_credential: self.identity_credential.clone(),
    }
  }
}

/// Fields returned by the public membership-card lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberCard {
  pub membership_number:   String,
  pub full_name:           String,
  pub status:              MemberStatus,
  pub commune:             String,
  pub identity_credential: String,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Fields supplied by an applicant at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
  pub full_name:   String,
  pub national_id: Option<String>,
  pub commune:     String,
  pub profession:  String,
  pub phone:       String,
  pub email:       Option<String>,
}

impl Registration {
  pub fn validate(&self) -> Result<()> {
    require("full_name", &self.full_name)?;
    require("commune", &self.commune)?;
    require("profession", &self.profession)?;
    require("phone", &self.phone)?;
    if let Some(email) = self.email.as_deref()
      && !email.trim().is_empty()
    {
      validate_email(email)?;
    }
    Ok(())
  }

  /// Trim every field and drop empty optionals.
  pub fn normalized(self) -> Self {
    Self {
      full_name:   self.full_name.trim().to_owned(),
      national_id: non_empty(self.national_id),
      commune:     self.commune.trim().to_owned(),
      profession:  self.profession.trim().to_owned(),
      phone:       self.phone.trim().to_owned(),
      email:       non_empty(self.email),
    }
  }
}

/// A member's partial update of their own contact fields.
///
/// Status, role and membership number have no representation here, so this
/// path cannot change them. An empty `email` clears the stored address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactUpdate {
  pub full_name:  Option<String>,
  pub commune:    Option<String>,
  pub profession: Option<String>,
  pub phone:      Option<String>,
  pub email:      Option<String>,
}

impl ContactUpdate {
  pub fn validate(&self) -> Result<()> {
    let required = [
      ("full_name", &self.full_name),
      ("commune", &self.commune),
      ("profession", &self.profession),
      ("phone", &self.phone),
    ];
    for (field, value) in required {
      if let Some(v) = value {
        require(field, v)?;
      }
    }
    if let Some(email) = self.email.as_deref()
      && !email.trim().is_empty()
    {
      validate_email(email)?;
    }
    Ok(())
  }

  pub fn is_empty(&self) -> bool {
    self.full_name.is_none()
      && self.commune.is_none()
      && self.profession.is_none()
      && self.phone.is_none()
      && self.email.is_none()
  }

  pub fn normalized(self) -> Self {
    let trim = |v: Option<String>| v.map(|s| s.trim().to_owned());
    Self {
      full_name:  trim(self.full_name),
      commune:    trim(self.commune),
      profession: trim(self.profession),
      phone:      trim(self.phone),
      email:      trim(self.email),
    }
  }
}

/// Input to [`crate::store::MembershipStore::insert_member`]. Identifiers and
/// timestamps are assigned by the store; status starts at `pending` and role at
/// `militant`.
#[derive(Debug, Clone)]
pub struct NewMember {
  pub account_id:           String,
  pub membership_number:    String,
  pub registration:         Registration,
  pub identity_credential:  String,
  pub credential_issued_at: DateTime<Utc>,
}

/// A guarded status transition: applied only while the stored status still
/// equals `from`.
#[derive(Debug, Clone)]
pub struct StatusChange {
  pub from:   MemberStatus,
  pub to:     MemberStatus,
  pub reason: Option<String>,
}

/// A credential reissue, applied only while the stored status and name still
/// match what the credential was signed over.
#[derive(Debug, Clone)]
pub struct CredentialRenewal {
  pub status:     MemberStatus,
  pub full_name:  String,
  pub credential: String,
  pub issued_at:  DateTime<Utc>,
}

/// Read-side filter for [`crate::store::MembershipStore::list_members`].
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
  pub status: Option<MemberStatus>,
  /// Case-insensitive substring over name, membership number and commune.
  pub text:   Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn non_empty(value: Option<String>) -> Option<String> {
  value
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
}

fn validate_email(email: &str) -> Result<()> {
  let email = email.trim();
  match email.split_once('@') {
    Some((local, domain))
      if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
    {
      Ok(())
    }
    _ => Err(Error::validation("email", format!("{email:?} is not an email address"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [MemberStatus; 3] =
    [MemberStatus::Pending, MemberStatus::Active, MemberStatus::Suspended];

  fn reachable(from: MemberStatus) -> Vec<MemberStatus> {
    ALL.into_iter().filter(|to| from.can_transition_to(*to)).collect()
  }

  #[test]
  fn status_machine_is_closed() {
    assert_eq!(
      reachable(MemberStatus::Pending),
      vec![MemberStatus::Active, MemberStatus::Suspended]
    );
    assert_eq!(reachable(MemberStatus::Active), vec![MemberStatus::Suspended]);
    assert_eq!(reachable(MemberStatus::Suspended), vec![MemberStatus::Active]);
  }

  #[test]
  fn active_never_returns_to_pending() {
    assert!(!MemberStatus::Active.can_transition_to(MemberStatus::Pending));
    assert!(!MemberStatus::Suspended.can_transition_to(MemberStatus::Pending));
  }

  #[test]
  fn transition_names() {
    assert_eq!(
      MemberStatus::Pending.transition_to(MemberStatus::Suspended),
      Some("reject")
    );
    assert_eq!(
      MemberStatus::Active.transition_to(MemberStatus::Suspended),
      Some("suspend")
    );
  }

  fn registration() -> Registration {
    Registration {
      full_name:   "Fatou Traoré".into(),
      national_id: None,
      commune:     "Bamako".into(),
      profession:  "Enseignante".into(),
      phone:       "+223 70 00 00 00".into(),
      email:       None,
    }
  }

  #[test]
  fn registration_requires_name() {
    let mut r = registration();
    r.full_name = "   ".into();
    let err = r.validate().unwrap_err();
    assert!(matches!(err, Error::Validation { field: "full_name", .. }));
  }

  #[test]
  fn registration_rejects_bad_email() {
    let mut r = registration();
    r.email = Some("not-an-address".into());
    assert!(matches!(
      r.validate(),
      Err(Error::Validation { field: "email", .. })
    ));

    r.email = Some("fatou@example.ml".into());
    assert!(r.validate().is_ok());
  }

  #[test]
  fn normalization_drops_blank_optionals() {
    let mut r = registration();
    r.national_id = Some("  ".into());
    r.full_name = "  Fatou Traoré ".into();
    let r = r.normalized();
    assert_eq!(r.national_id, None);
    assert_eq!(r.full_name, "Fatou Traoré");
  }

  #[test]
  fn contact_update_rejects_blank_phone() {
    let update = ContactUpdate { phone: Some(String::new()), ..Default::default() };
    assert!(matches!(
      update.validate(),
      Err(Error::Validation { field: "phone", .. })
    ));
  }

  #[test]
  fn contact_update_allows_clearing_email() {
    let update = ContactUpdate { email: Some(String::new()), ..Default::default() };
    assert!(update.validate().is_ok());
    assert!(!update.is_empty());
  }
}
