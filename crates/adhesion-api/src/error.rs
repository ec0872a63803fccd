//! API error type and [`axum::response::IntoResponse`] implementation.

use adhesion_core::Error as CoreError;
use axum::{
  Json,
  extract::{
    path::ErrorKind,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// An error returned by an API handler or extractor.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  /// No usable credentials were presented.
  #[error("unauthorized")]
  Unauthorized,

  /// Credentials were presented but do not grant this operation.
  #[error("forbidden")]
  Forbidden,

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request body, path or query could not be decoded.
  #[error("{message}")]
  Rejected {
    status:  StatusCode,
    field:   Option<String>,
    message: String,
  },
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    let message = rejection.body_text();
    let field = match &rejection {
      JsonRejection::JsonDataError(_) => field_from_json_error(&message),
      _ => None,
    };
    ApiError::Rejected { status: rejection.status(), field, message }
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    let field = match &rejection {
      PathRejection::FailedToDeserializePathParams(e) => match e.kind() {
        ErrorKind::ParseErrorAtKey { key, .. } => Some(key.clone()),
        _ => None,
      },
      _ => None,
    };
    ApiError::Rejected {
      status: rejection.status(),
      field,
      message: rejection.body_text(),
    }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    ApiError::Rejected {
      status:  rejection.status(),
      field:   None,
      message: rejection.body_text(),
    }
  }
}

/// Name of the offending field in a serde data error, e.g. `commune` from
/// "missing field `commune` at line 1 column 40" or `amount` from
/// "amount: invalid type: string …".
pub(crate) fn field_from_json_error(message: &str) -> Option<String> {
  let detail = message
    .split_once("target type: ")
    .map_or(message, |(_, rest)| rest);

  if let Some(rest) = detail.split_once("missing field `").map(|(_, r)| r) {
    return rest.split_once('`').map(|(name, _)| name.to_owned());
  }
  let (path, _) = detail.split_once(": ")?;
  (path != "." && !path.is_empty() && !path.contains(' ')).then(|| path.to_owned())
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::Core(e) => match e {
        CoreError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::AlreadyRegistered { .. }
        | CoreError::Conflict(_)
        | CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Store(_) | CoreError::Serialization(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden => StatusCode::FORBIDDEN,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Rejected { status, .. } => *status,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();

    let mut body = Map::new();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
      tracing::error!(error = %self, "request failed");
      body.insert("error".into(), json!("internal error"));
    } else {
      body.insert("error".into(), json!(self.to_string()));
    }
    match &self {
      ApiError::Core(CoreError::Validation { field, .. }) => {
        body.insert("field".into(), json!(field));
      }
      ApiError::Core(CoreError::AlreadyRegistered { membership_number }) => {
        body.insert("membership_number".into(), json!(membership_number));
      }
      ApiError::Rejected { field: Some(field), .. } => {
        body.insert("field".into(), json!(field));
      }
      _ => {}
    }

    let mut res = (status, Json(Value::Object(body))).into_response();
    if let ApiError::Unauthorized = self {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"adhesion\""),
      );
    }
    res
  }
}
