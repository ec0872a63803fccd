//! The member registry: registration, profile reads, contact edits, and the
//! administrator-driven status/role changes.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::require,
  identity::{CredentialPayload, IdentityAllocator},
  member::{
    ContactUpdate, CredentialRenewal, MemberCard, MemberProfile, MemberQuery,
    MemberRole, MemberStatus, NewMember, Registration, StatusChange,
  },
  store::{MemberInsert, MembershipStore, Transition},
};

/// How many fresh numbers registration draws before giving up when the
/// number it was handed is already taken (only possible with rows imported
/// outside the counter).
const MAX_ALLOCATION_ATTEMPTS: usize = 5;

pub struct MemberRegistry<S> {
  store:    Arc<S>,
  identity: IdentityAllocator<S>,
}

impl<S> Clone for MemberRegistry<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), identity: self.identity.clone() }
  }
}

impl<S: MembershipStore> MemberRegistry<S> {
  pub fn new(store: Arc<S>, identity: IdentityAllocator<S>) -> Self {
    Self { store, identity }
  }

  pub fn identity(&self) -> &IdentityAllocator<S> { &self.identity }

  // ── Member-facing ─────────────────────────────────────────────────────

  /// Create the profile for `account_id` with status `pending` and role
  /// `militant`.
  ///
  /// Fails with [`Error::AlreadyRegistered`] if the account already owns a
  /// profile, including when a concurrent registration for the same account
  /// wins the insert.
  pub async fn register(
    &self,
    account_id: &str,
    registration: Registration,
  ) -> Result<MemberProfile> {
    require("account_id", account_id)?;
    registration.validate()?;
    let registration = registration.normalized();

    if let Some(existing) = self
      .store
      .get_member_by_account(account_id.to_owned())
      .await
      .map_err(Error::store)?
    {
      return Err(Error::AlreadyRegistered {
        membership_number: existing.membership_number,
      });
    }

    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
      let membership_number = self.identity.allocate().await?;
      let (identity_credential, credential_issued_at) = self.identity.issue_credential(
        &membership_number,
        &registration.full_name,
        MemberStatus::Pending,
      )?;

      let outcome = self
        .store
        .insert_member(NewMember {
          account_id: account_id.to_owned(),
          membership_number,
          registration: registration.clone(),
          identity_credential,
          credential_issued_at,
        })
        .await
        .map_err(Error::store)?;

      match outcome {
        MemberInsert::Created(profile) => {
          info!(
            member_id = %profile.member_id,
            membership_number = %profile.membership_number,
            "member registered"
          );
          return Ok(profile);
        }
        MemberInsert::AccountTaken(existing) => {
          return Err(Error::AlreadyRegistered {
            membership_number: existing.membership_number,
          });
        }
        MemberInsert::NumberTaken(number) => {
          warn!(%number, attempt, "membership number already assigned; drawing another");
        }
      }
    }

    Err(Error::Conflict(format!(
      "no free membership number after {MAX_ALLOCATION_ATTEMPTS} attempts"
    )))
  }

  pub async fn get_by_account(&self, account_id: &str) -> Result<MemberProfile> {
    self
      .store
      .get_member_by_account(account_id.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("no profile for account {account_id}")))
  }

  /// Public card lookup; exposes only non-sensitive fields.
  pub async fn get_by_membership_number(&self, membership_number: &str) -> Result<MemberCard> {
    self
      .store
      .get_member_by_number(membership_number.trim().to_owned())
      .await
      .map_err(Error::store)?
      .map(|p| p.card())
      .ok_or_else(|| Error::NotFound(format!("membership number {membership_number}")))
  }

  /// Edit the caller's own contact fields.
  pub async fn update_contact_fields(
    &self,
    account_id: &str,
    update: ContactUpdate,
  ) -> Result<MemberProfile> {
    update.validate()?;
    if update.is_empty() {
      return self.get_by_account(account_id).await;
    }

    self
      .store
      .update_member_contact(account_id.to_owned(), update.normalized())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("no profile for account {account_id}")))
  }

  pub fn verify_credential(&self, credential: &str) -> Result<CredentialPayload> {
    self.identity.verify_credential(credential)
  }

  // ── Administrator ─────────────────────────────────────────────────────

  pub async fn get_member(&self, member_id: Uuid) -> Result<MemberProfile> {
    self
      .store
      .get_member(member_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("member {member_id}")))
  }

  /// Move a member through the status machine (see
  /// [`MemberStatus::transition_to`]).
  ///
  /// The write is guarded on the status read here; if another administrator
  /// changed it in between, this call fails with [`Error::Conflict`] instead
  /// of overwriting their decision.
  pub async fn set_status(
    &self,
    member_id: Uuid,
    status: MemberStatus,
    reason: Option<String>,
  ) -> Result<MemberProfile> {
    let current = self.get_member(member_id).await?;

    let Some(action) = current.status.transition_to(status) else {
      warn!(%member_id, from = %current.status, to = %status, "rejected status transition");
      return Err(Error::InvalidTransition {
        from: current.status.as_str(),
        to:   status.as_str(),
      });
    };

    let change = StatusChange {
      from:   current.status,
      to:     status,
      reason: reason.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty()),
    };

    match self
      .store
      .transition_member_status(member_id, change)
      .await
      .map_err(Error::store)?
    {
      Transition::Applied(profile) => {
        info!(%member_id, action, status = %profile.status, "member status changed");
        Ok(profile)
      }
      Transition::Stale(profile) => Err(Error::Conflict(format!(
        "member {member_id} is now {}; expected {}",
        profile.status, current.status
      ))),
      Transition::Missing => Err(Error::NotFound(format!("member {member_id}"))),
    }
  }

  /// Assign any role; roles carry no lifecycle.
  pub async fn set_role(&self, member_id: Uuid, role: MemberRole) -> Result<MemberProfile> {
    let profile = self
      .store
      .set_member_role(member_id, role)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("member {member_id}")))?;
    info!(%member_id, %role, "member role changed");
    Ok(profile)
  }

  /// Issue a fresh credential from the member's current name and status.
  /// Status changes never do this implicitly.
  pub async fn reissue_credential(&self, member_id: Uuid) -> Result<MemberProfile> {
    let current = self.get_member(member_id).await?;
    let (credential, issued_at) = self.identity.issue_credential(
      &current.membership_number,
      &current.full_name,
      current.status,
    )?;

    let renewal = CredentialRenewal {
      status: current.status,
      full_name: current.full_name.clone(),
      credential,
      issued_at,
    };

    match self
      .store
      .replace_credential(member_id, renewal)
      .await
      .map_err(Error::store)?
    {
      Transition::Applied(profile) => {
        info!(%member_id, status = %profile.status, "credential reissued");
        Ok(profile)
      }
      Transition::Stale(profile) => {
        warn!(%member_id, status = %profile.status, "credential reissue raced a profile change");
        Err(Error::Conflict(format!(
          "member {member_id} changed while its credential was being issued"
        )))
      }
      Transition::Missing => Err(Error::NotFound(format!("member {member_id}"))),
    }
  }

  pub async fn list(&self, mut query: MemberQuery) -> Result<Vec<MemberProfile>> {
    query.text = query
      .text
      .map(|t| t.trim().to_owned())
      .filter(|t| !t.is_empty());
    self.store.list_members(&query).await.map_err(Error::store)
  }
}
