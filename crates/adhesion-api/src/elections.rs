//! Handlers for election field reports.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/elections/submit-results` | Session; body [`SubmitBody`]; 201 + submission |
//! | `GET`  | `/elections/my-submissions` | Session; newest first |
//! | `GET`  | `/admin/elections/pending` | Admin; newest first |
//! | `POST` | `/admin/elections/{id}/verify` | Admin; body `{"decision":"verified"|"rejected"}` |

use adhesion_core::{
  election::{ElectionResultSubmission, GeographicScope, ReviewDecision},
  store::MembershipStore,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Administrator, Session},
  error::ApiError,
  extract::{Json, Path},
};

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub election_type: String,
  #[serde(flatten)]
  pub scope:         GeographicScope,
  /// Candidate or list → tally. Non-integer values are coerced.
  #[serde(default)]
  pub results:       Map<String, Value>,
  pub evidence_ref:  Option<String>,
}

/// `POST /elections/submit-results`
pub async fn submit<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
  Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError> {
  let member = state.member_for(&account_id).await?;
  let submission = state
    .reports
    .submit(
      member.member_id,
      &body.election_type,
      body.scope,
      &body.results,
      body.evidence_ref,
    )
    .await?;
  Ok((StatusCode::CREATED, Json(submission)))
}

/// `GET /elections/my-submissions`
pub async fn my_submissions<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
) -> Result<Json<Vec<ElectionResultSubmission>>, ApiError> {
  let member = state.member_for(&account_id).await?;
  Ok(Json(state.reports.history_for_member(member.member_id).await?))
}

/// `GET /admin/elections/pending`
pub async fn admin_pending<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
) -> Result<Json<Vec<ElectionResultSubmission>>, ApiError> {
  Ok(Json(state.reports.list_pending().await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub decision: ReviewDecision,
}

/// `POST /admin/elections/{id}/verify`
pub async fn admin_verify<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Path(id): Path<Uuid>,
  Json(body): Json<VerifyBody>,
) -> Result<Json<ElectionResultSubmission>, ApiError> {
  Ok(Json(state.reports.verify(id, body.decision).await?))
}
