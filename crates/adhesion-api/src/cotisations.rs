//! Handlers for `/cotisations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/cotisations/initiate` | Session; body [`InitiateBody`]; 201 + cotisation and instructions |
//! | `POST` | `/cotisations/confirm` | Session; caller must own the cotisation |
//! | `GET`  | `/cotisations/my-history` | Session; newest first |
//! | `POST` | `/admin/cotisations/{id}/fail` | Admin; body `{"reason":"..."}` (optional) |

use adhesion_core::{
  cotisation::{Cotisation, CotisationKind, DisplayAmount, PaymentMethod},
  currency::{CANONICAL, Currency},
  store::MembershipStore,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Administrator, Session},
  error::ApiError,
  extract::{Json, Path},
};

#[derive(Debug, Deserialize)]
pub struct InitiateBody {
  /// Amount in the canonical currency.
  pub amount:           i64,
  #[serde(alias = "type")]
  pub kind:             CotisationKind,
  pub payment_method:   PaymentMethod,
  /// Currency the member was shown; recorded for presentation only.
  pub display_currency: Option<Currency>,
}

/// `POST /cotisations/initiate`
pub async fn initiate<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
  Json(body): Json<InitiateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let member = state.member_for(&account_id).await?;
  let display = body
    .display_currency
    .filter(|c| *c != CANONICAL)
    .map(|currency| DisplayAmount {
      currency,
      amount: state.dues.rates().display_amount(body.amount, currency),
    });

  let initiated = state
    .dues
    .initiate(member.member_id, body.amount, body.kind, body.payment_method, display)
    .await?;
  Ok((StatusCode::CREATED, Json(initiated)))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
  pub cotisation_id:  Uuid,
  pub transaction_id: String,
}

/// `POST /cotisations/confirm`
pub async fn confirm<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
  Json(body): Json<ConfirmBody>,
) -> Result<Json<Cotisation>, ApiError> {
  let member = state.member_for(&account_id).await?;
  let cotisation = state.dues.get(body.cotisation_id).await?;
  if cotisation.member_id != member.member_id {
    return Err(ApiError::Forbidden);
  }
  Ok(Json(state.dues.confirm(body.cotisation_id, &body.transaction_id).await?))
}

/// `GET /cotisations/my-history`
pub async fn my_history<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Session(account_id): Session,
) -> Result<Json<Vec<Cotisation>>, ApiError> {
  let member = state.member_for(&account_id).await?;
  Ok(Json(state.dues.history_for_member(member.member_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct FailBody {
  pub reason: Option<String>,
}

/// `POST /admin/cotisations/{id}/fail`
pub async fn admin_fail<S: MembershipStore>(
  State(state): State<AppState<S>>,
  _admin: Administrator,
  Path(id): Path<Uuid>,
  Json(body): Json<FailBody>,
) -> Result<Json<Cotisation>, ApiError> {
  Ok(Json(state.dues.mark_failed(id, body.reason).await?))
}
