//! The `MembershipStore` trait and the outcome types of its guarded writes.
//!
//! The trait is implemented by storage backends (e.g.
//! `adhesion-store-sqlite`). Workflows in this crate depend on this
//! abstraction, never on a concrete backend.
//!
//! Every invariant that must survive concurrent requests is delegated to the
//! store as a single atomic primitive: the sequence increment, the unique
//! account/number constraints, and the status-guarded updates. Workflows never
//! read a value and write a decision derived from it in two steps.

use std::future::Future;

use uuid::Uuid;

use crate::{
  cotisation::{Cotisation, NewCotisation, Settlement},
  election::{
    ElectionResultSubmission, NewSubmission, ReviewDecision, SubmissionQuery,
  },
  member::{
    ContactUpdate, CredentialRenewal, MemberProfile, MemberQuery, MemberRole,
    NewMember, StatusChange,
  },
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`MembershipStore::insert_member`].
#[derive(Debug, Clone)]
pub enum MemberInsert {
  Created(MemberProfile),
  /// The account already owns this profile; nothing was written.
  AccountTaken(MemberProfile),
  /// The membership number is already assigned; nothing was written.
  NumberTaken(String),
}

/// Result of a write guarded on the record's current status.
#[derive(Debug, Clone)]
pub enum Transition<T> {
  /// The guard matched and the record was updated.
  Applied(T),
  /// The record exists but its status no longer matched the guard. Carries
  /// the record as currently stored.
  Stale(T),
  Missing,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the store of record.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait MembershipStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sequences ─────────────────────────────────────────────────────────

  /// Atomically increment the named counter and return its new value.
  /// The first call for a name returns `1`.
  fn next_sequence(
    &self,
    name: &'static str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Members ───────────────────────────────────────────────────────────

  /// Persist a new profile with status `pending` and role `militant`.
  ///
  /// Uniqueness of the account and of the membership number is decided by
  /// the storage layer in the same statement as the insert.
  fn insert_member(
    &self,
    input: NewMember,
  ) -> impl Future<Output = Result<MemberInsert, Self::Error>> + Send + '_;

  fn get_member(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Option<MemberProfile>, Self::Error>> + Send + '_;

  fn get_member_by_account(
    &self,
    account_id: String,
  ) -> impl Future<Output = Result<Option<MemberProfile>, Self::Error>> + Send + '_;

  fn get_member_by_number(
    &self,
    membership_number: String,
  ) -> impl Future<Output = Result<Option<MemberProfile>, Self::Error>> + Send + '_;

  /// Apply the `Some` fields of `update` to the account's profile. Returns
  /// `None` if the account has no profile.
  fn update_member_contact(
    &self,
    account_id: String,
    update: ContactUpdate,
  ) -> impl Future<Output = Result<Option<MemberProfile>, Self::Error>> + Send + '_;

  /// Set the status to `change.to` only if it currently equals
  /// `change.from`; records `change.from` as the previous status.
  fn transition_member_status(
    &self,
    member_id: Uuid,
    change: StatusChange,
  ) -> impl Future<Output = Result<Transition<MemberProfile>, Self::Error>> + Send + '_;

  fn set_member_role(
    &self,
    member_id: Uuid,
    role: MemberRole,
  ) -> impl Future<Output = Result<Option<MemberProfile>, Self::Error>> + Send + '_;

  /// Replace the stored identity credential only if the profile's status and
  /// name still equal `renewal.status` and `renewal.full_name`.
  fn replace_credential(
    &self,
    member_id: Uuid,
    renewal: CredentialRenewal,
  ) -> impl Future<Output = Result<Transition<MemberProfile>, Self::Error>> + Send + '_;

  /// Newest profiles first.
  fn list_members<'a>(
    &'a self,
    query: &'a MemberQuery,
  ) -> impl Future<Output = Result<Vec<MemberProfile>, Self::Error>> + Send + 'a;

  // ── Cotisations ───────────────────────────────────────────────────────

  /// Persist a new cotisation with status `pending`.
  fn insert_cotisation(
    &self,
    input: NewCotisation,
  ) -> impl Future<Output = Result<Cotisation, Self::Error>> + Send + '_;

  fn get_cotisation(
    &self,
    cotisation_id: Uuid,
  ) -> impl Future<Output = Result<Option<Cotisation>, Self::Error>> + Send + '_;

  /// Apply `settlement` only while the cotisation is `pending`. A completed
  /// settlement stamps `paid_at`.
  fn settle_cotisation(
    &self,
    cotisation_id: Uuid,
    settlement: Settlement,
  ) -> impl Future<Output = Result<Transition<Cotisation>, Self::Error>> + Send + '_;

  /// A member's cotisations, newest first.
  fn list_cotisations(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Cotisation>, Self::Error>> + Send + '_;

  // ── Election results ──────────────────────────────────────────────────

  /// Persist a new submission with status `pending`.
  fn insert_submission(
    &self,
    input: NewSubmission,
  ) -> impl Future<Output = Result<ElectionResultSubmission, Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    result_id: Uuid,
  ) -> impl Future<Output = Result<Option<ElectionResultSubmission>, Self::Error>>
  + Send
  + '_;

  /// Newest submissions first.
  fn list_submissions<'a>(
    &'a self,
    query: &'a SubmissionQuery,
  ) -> impl Future<Output = Result<Vec<ElectionResultSubmission>, Self::Error>>
  + Send
  + 'a;

  /// Record `decision` only while the submission is `pending`; stamps
  /// `reviewed_at`.
  fn review_submission(
    &self,
    result_id: Uuid,
    decision: ReviewDecision,
  ) -> impl Future<
    Output = Result<Transition<ElectionResultSubmission>, Self::Error>,
  > + Send
  + '_;
}
