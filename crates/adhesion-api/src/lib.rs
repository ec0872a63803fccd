//! JSON REST API for Adhesion.
//!
//! Exposes an axum [`Router`] backed by any
//! [`adhesion_core::store::MembershipStore`]. Member endpoints require a
//! session token; `/admin` endpoints require the administrator secret.

pub mod auth;
pub mod config;
pub mod cotisations;
pub mod currency;
pub mod elections;
pub mod error;
pub mod extract;
pub mod members;

pub use config::ServerConfig;
pub use error::ApiError;

use std::sync::Arc;

use adhesion_core::{
  dues::DuesWorkflow,
  identity::IdentityAllocator,
  member::MemberProfile,
  registry::MemberRegistry,
  reports::FieldReportWorkflow,
  store::MembershipStore,
};
use axum::{
  Router,
  routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use auth::AccessGuard;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub registry: MemberRegistry<S>,
  pub dues:     DuesWorkflow<S>,
  pub reports:  FieldReportWorkflow<S>,
  pub guard:    Arc<AccessGuard>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      registry: self.registry.clone(),
      dues:     self.dues.clone(),
      reports:  self.reports.clone(),
      guard:    self.guard.clone(),
    }
  }
}

impl<S: MembershipStore> AppState<S> {
  /// Wire every workflow to `store` with the settings from `config`.
  pub fn new(store: Arc<S>, config: &ServerConfig) -> Self {
    let identity = IdentityAllocator::new(store.clone(), config.identity.clone());
    Self {
      registry: MemberRegistry::new(store.clone(), identity),
      dues:     DuesWorkflow::new(store.clone(), config.dues.clone(), config.rates),
      reports:  FieldReportWorkflow::new(store),
      guard:    Arc::new(AccessGuard::new(&config.auth)),
    }
  }

  /// Profile owned by the session's account.
  pub(crate) async fn member_for(&self, account_id: &str) -> Result<MemberProfile, ApiError> {
    Ok(self.registry.get_by_account(account_id).await?)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MembershipStore + 'static,
{
  Router::new()
    // Members
    .route("/members/register", post(members::register::<S>))
    .route("/members/card/{membership_number}", get(members::card::<S>))
    .route("/members/credentials/verify", post(members::verify_credential::<S>))
    .route("/members/me", get(members::me::<S>).put(members::update_me::<S>))
    // Dues
    .route("/cotisations/initiate", post(cotisations::initiate::<S>))
    .route("/cotisations/confirm", post(cotisations::confirm::<S>))
    .route("/cotisations/my-history", get(cotisations::my_history::<S>))
    .route("/currency/convert", get(currency::convert::<S>))
    // Field reports
    .route("/elections/submit-results", post(elections::submit::<S>))
    .route("/elections/my-submissions", get(elections::my_submissions::<S>))
    // Administration
    .route("/admin/members", get(members::admin_list::<S>))
    .route("/admin/members/{id}", get(members::admin_get::<S>))
    .route("/admin/members/{id}/status", put(members::admin_set_status::<S>))
    .route("/admin/members/{id}/role", put(members::admin_set_role::<S>))
    .route("/admin/members/{id}/credential", post(members::admin_reissue_credential::<S>))
    .route("/admin/cotisations/{id}/fail", post(cotisations::admin_fail::<S>))
    .route("/admin/elections/pending", get(elections::admin_pending::<S>))
    .route("/admin/elections/{id}/verify", post(elections::admin_verify::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
