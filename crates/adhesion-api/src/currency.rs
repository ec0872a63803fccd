//! Handler for `GET /currency/convert`.

use adhesion_core::{currency::Currency, store::MembershipStore};
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::ApiError,
  extract::{Json, Query},
};

#[derive(Debug, Deserialize)]
pub struct ConvertParams {
  pub amount: f64,
  pub from:   Currency,
  pub to:     Currency,
}

#[derive(Debug, Serialize)]
pub struct Conversion {
  pub amount:    f64,
  pub from:      Currency,
  pub to:        Currency,
  /// Unrounded result.
  pub converted: f64,
  /// `converted` rounded to the nearest whole unit.
  pub display:   i64,
}

/// `GET /currency/convert?amount=...&from=EUR&to=XOF`
pub async fn convert<S: MembershipStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ConvertParams>,
) -> Result<Json<Conversion>, ApiError> {
  if !params.amount.is_finite() {
    return Err(ApiError::BadRequest("amount must be a finite number".into()));
  }
  let converted = state.dues.rates().convert(params.amount, params.from, params.to);
  Ok(Json(Conversion {
    amount: params.amount,
    from: params.from,
    to: params.to,
    converted,
    display: converted.round() as i64,
  }))
}
