//! Handlers for `/members` and `/admin/members` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/members/register` | Session; body [`Registration`]; 201 + profile |
//! | `GET`  | `/members/card/{membership_number}` | Public card |
//! | `POST` | `/members/credentials/verify` | Public; body `{"credential":"..."}` |
//! | `GET`  | `/members/me` | Session |
//! | `PUT`  | `/members/me` | Session; body [`ContactUpdate`] |
//! | `GET`  | `/admin/members` | `?status=&q=&limit=&offset=` |
//! | `GET`  | `/admin/members/{id}` | Full profile |
//! | `PUT`  | `/admin/members/{id}/status` | Body [`StatusBody`] |
//! | `PUT`  | `/admin/members/{id}/role` | Body [`RoleBody`] |
//! | `POST` | `/admin/members/{id}/credential` | Reissue from current state |

use adhesion_core::{
  member::{
    ContactUpdate, MemberCard, MemberProfile, MemberQuery, MemberRole,
    MemberStatus, Registration,
  },
  store::MembershipStore,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Administrator, Session},
  error::ApiError,
  extract::{Json, Path, Query},
};

// ─── Member-facing ────────────────────────────────────────────────────────────

/// `POST /members/register`: returns 201 + the new profile.
pub async fn register<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
  Json(body): Json<Registration>,
) -> Result<impl IntoResponse, ApiError> {
  let profile = state.registry.register(&account_id, body).await?;
  Ok((StatusCode::CREATED, Json(profile)))
}

/// `GET /members/card/{membership_number}`
pub async fn card<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Path(membership_number): Path<String>,
) -> Result<Json<MemberCard>, ApiError> {
  Ok(Json(state.registry.get_by_membership_number(&membership_number).await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub credential: String,
}

/// What a scanned credential attests to.
#[derive(Debug, Serialize)]
pub struct CredentialView {
  pub membership_number: String,
  pub full_name:         String,
  pub status:            MemberStatus,
  pub issued_at:         DateTime<Utc>,
}

/// `POST /members/credentials/verify`
pub async fn verify_credential<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<VerifyBody>,
) -> Result<Json<CredentialView>, ApiError> {
  let payload = state.registry.verify_credential(&body.credential)?;
  Ok(Json(CredentialView {
    membership_number: payload.membership_number,
    full_name:         payload.full_name,
    status:            payload.status,
    issued_at:         payload.issued_at,
  }))
}

/// `GET /members/me`
pub async fn me<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
) -> Result<Json<MemberProfile>, ApiError> {
  Ok(Json(state.member_for(&account_id).await?))
}

/// `PUT /members/me`: only contact fields are accepted.
pub async fn update_me<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
  Json(body): Json<ContactUpdate>,
) -> Result<Json<MemberProfile>, ApiError> {
  Ok(Json(state.registry.update_contact_fields(&account_id, body).await?))
}

// ─── Administration ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub status: Option<MemberStatus>,
  /// Substring matched against name, membership number and commune.
  pub q:      Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /admin/members[?status=...][&q=...][&limit=...][&offset=...]`
pub async fn admin_list<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<MemberProfile>>, ApiError> {
  let query = MemberQuery {
    status: params.status,
    text:   params.q,
    limit:  params.limit,
    offset: params.offset,
  };
  Ok(Json(state.registry.list(query).await?))
}

/// `GET /admin/members/{id}`
pub async fn admin_get<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Path(id): Path<Uuid>,
) -> Result<Json<MemberProfile>, ApiError> {
  Ok(Json(state.registry.get_member(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: MemberStatus,
  pub reason: Option<String>,
}

/// `PUT /admin/members/{id}/status`
pub async fn admin_set_status<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<MemberProfile>, ApiError> {
  Ok(Json(state.registry.set_status(id, body.status, body.reason).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: MemberRole,
}

/// `PUT /admin/members/{id}/role`
pub async fn admin_set_role<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<MemberProfile>, ApiError> {
  Ok(Json(state.registry.set_role(id, body.role).await?))
}

/// `POST /admin/members/{id}/credential`
pub async fn admin_reissue_credential<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Path(id): Path<Uuid>,
) -> Result<Json<MemberProfile>, ApiError> {
  Ok(Json(state.registry.reissue_credential(id).await?))
}
