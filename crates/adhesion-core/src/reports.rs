//! The field-report workflow: members submit polling-station tallies,
//! administrators verify or reject each one exactly once.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  election::{
    ElectionResultSubmission, GeographicScope, NewSubmission, ReviewDecision,
    SubmissionQuery, SubmissionStatus, coerce_tally,
  },
  error::require,
  store::{MembershipStore, Transition},
};

pub struct FieldReportWorkflow<S> {
  store: Arc<S>,
}

impl<S> Clone for FieldReportWorkflow<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: MembershipStore> FieldReportWorkflow<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Record a pending submission attributed to `member_id`.
  pub async fn submit(
    &self,
    member_id: Uuid,
    election_type: &str,
    scope: GeographicScope,
    results: &Map<String, Value>,
    evidence_ref: Option<String>,
  ) -> Result<ElectionResultSubmission> {
    require("election_type", election_type)?;
    scope.validate()?;

    self
      .store
      .get_member(member_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("member {member_id}")))?;

    let submission = self
      .store
      .insert_submission(NewSubmission {
        member_id,
        election_type: election_type.trim().to_owned(),
        scope: scope.normalized(),
        results: coerce_tally(results),
        evidence_ref: evidence_ref
          .map(|e| e.trim().to_owned())
          .filter(|e| !e.is_empty()),
      })
      .await
      .map_err(Error::store)?;

    info!(
      result_id = %submission.result_id,
      %member_id,
      bureau_vote = %submission.scope.bureau_vote,
      "election result submitted"
    );
    Ok(submission)
  }

  /// All submissions awaiting review, newest first.
  pub async fn list_pending(&self) -> Result<Vec<ElectionResultSubmission>> {
    let query = SubmissionQuery {
      status: Some(SubmissionStatus::Pending),
      ..Default::default()
    };
    self.store.list_submissions(&query).await.map_err(Error::store)
  }

  /// A member's own submissions, newest first.
  pub async fn history_for_member(
    &self,
    member_id: Uuid,
  ) -> Result<Vec<ElectionResultSubmission>> {
    let query = SubmissionQuery { member_id: Some(member_id), ..Default::default() };
    self.store.list_submissions(&query).await.map_err(Error::store)
  }

  pub async fn get(&self, result_id: Uuid) -> Result<ElectionResultSubmission> {
    self
      .store
      .get_submission(result_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("election result {result_id}")))
  }

  /// Close a pending submission with `decision`. Terminal submissions are
  /// left untouched and the call fails with [`Error::InvalidTransition`].
  pub async fn verify(
    &self,
    result_id: Uuid,
    decision: ReviewDecision,
  ) -> Result<ElectionResultSubmission> {
    match self
      .store
      .review_submission(result_id, decision)
      .await
      .map_err(Error::store)?
    {
      Transition::Applied(submission) => {
        info!(%result_id, status = %submission.status, "election result reviewed");
        Ok(submission)
      }
      Transition::Stale(current) => {
        warn!(%result_id, status = %current.status, "election result already reviewed");
        Err(Error::InvalidTransition {
          from: current.status.as_str(),
          to:   decision.status().as_str(),
        })
      }
      Transition::Missing => Err(Error::NotFound(format!("election result {result_id}"))),
    }
  }
}
