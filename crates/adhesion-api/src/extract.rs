//! `Json`, `Path` and `Query` wrappers whose rejections are [`ApiError`]s, so
//! malformed bodies and ids get the same JSON error shape as domain errors.

use axum::{
  extract::{FromRequest, FromRequestParts},
  response::{IntoResponse, Response},
};

use crate::error::ApiError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
  axum::Json<T>: IntoResponse,
{
  fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);
