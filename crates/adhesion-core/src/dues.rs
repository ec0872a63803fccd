//! The dues workflow: initiate a cotisation, hand back provider instructions,
//! settle it once.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  cotisation::{
    Cotisation, CotisationKind, CotisationStatus, DisplayAmount, NewCotisation,
    PaymentMethod, Settlement,
  },
  currency::RateTable,
  instructions::{DuesConfig, PaymentInstructions, payment_instructions},
  store::{MembershipStore, Transition},
};

/// Returned by [`DuesWorkflow::initiate`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct InitiatedCotisation {
  pub cotisation:   Cotisation,
  pub instructions: PaymentInstructions,
}

pub struct DuesWorkflow<S> {
  store:  Arc<S>,
  config: DuesConfig,
  rates:  RateTable,
}

impl<S> Clone for DuesWorkflow<S> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      config: self.config.clone(),
      rates:  self.rates,
    }
  }
}

impl<S: MembershipStore> DuesWorkflow<S> {
  pub fn new(store: Arc<S>, config: DuesConfig, rates: RateTable) -> Self {
    Self { store, config, rates }
  }

  pub fn rates(&self) -> &RateTable { &self.rates }

  /// Open a pending cotisation of `amount` canonical units for `member_id`.
  ///
  /// Conversion from whatever the member was shown happens before this call;
  /// `display` is stored untouched for presentation.
  pub async fn initiate(
    &self,
    member_id: Uuid,
    amount: i64,
    kind: CotisationKind,
    payment_method: PaymentMethod,
    display: Option<DisplayAmount>,
  ) -> Result<InitiatedCotisation> {
    if amount <= 0 {
      return Err(Error::validation("amount", "must be greater than zero"));
    }

    self
      .store
      .get_member(member_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("member {member_id}")))?;

    let cotisation = self
      .store
      .insert_cotisation(NewCotisation {
        member_id,
        amount,
        display,
        kind,
        payment_method,
      })
      .await
      .map_err(Error::store)?;

    info!(
      cotisation_id = %cotisation.cotisation_id,
      %member_id,
      amount,
      method = payment_method.as_str(),
      "cotisation initiated"
    );

    let instructions = self.instructions_for(&cotisation);
    Ok(InitiatedCotisation { cotisation, instructions })
  }

  /// Regenerate the payment instructions of an existing cotisation.
  pub fn instructions_for(&self, cotisation: &Cotisation) -> PaymentInstructions {
    payment_instructions(
      cotisation.payment_method,
      cotisation.amount,
      &payment_reference(cotisation.cotisation_id),
      &self.config,
    )
  }

  pub async fn get(&self, cotisation_id: Uuid) -> Result<Cotisation> {
    self
      .store
      .get_cotisation(cotisation_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("cotisation {cotisation_id}")))
  }

  /// Mark a pending cotisation as paid.
  ///
  /// Confirming an already-completed cotisation returns it unchanged; its
  /// `paid_at` and transaction reference are never rewritten.
  pub async fn confirm(&self, cotisation_id: Uuid, transaction_id: &str) -> Result<Cotisation> {
    let transaction_id = transaction_id.trim();
    if transaction_id.is_empty() {
      return Err(Error::validation("transaction_id", "must not be empty"));
    }

    let settlement = Settlement::Completed { transaction_ref: transaction_id.to_owned() };
    match self.settle(cotisation_id, settlement).await? {
      Transition::Applied(c) => {
        info!(%cotisation_id, transaction_id, "cotisation completed");
        Ok(c)
      }
      Transition::Stale(c) if c.status == CotisationStatus::Completed => Ok(c),
      Transition::Stale(c) => Err(invalid(c.status, CotisationStatus::Completed)),
      Transition::Missing => Err(Error::NotFound(format!("cotisation {cotisation_id}"))),
    }
  }

  /// Mark a pending cotisation as failed.
  pub async fn mark_failed(
    &self,
    cotisation_id: Uuid,
    reason: Option<String>,
  ) -> Result<Cotisation> {
    let reason = reason.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty());
    match self.settle(cotisation_id, Settlement::Failed { reason }).await? {
      Transition::Applied(c) => {
        warn!(%cotisation_id, "cotisation failed");
        Ok(c)
      }
      Transition::Stale(c) if c.status == CotisationStatus::Failed => Ok(c),
      Transition::Stale(c) => Err(invalid(c.status, CotisationStatus::Failed)),
      Transition::Missing => Err(Error::NotFound(format!("cotisation {cotisation_id}"))),
    }
  }

  /// A member's cotisations, newest first.
  pub async fn history_for_member(&self, member_id: Uuid) -> Result<Vec<Cotisation>> {
    self.store.list_cotisations(member_id).await.map_err(Error::store)
  }

  async fn settle(
    &self,
    cotisation_id: Uuid,
    settlement: Settlement,
  ) -> Result<Transition<Cotisation>> {
    self
      .store
      .settle_cotisation(cotisation_id, settlement)
      .await
      .map_err(Error::store)
  }
}

/// Short memo derived from the cotisation id.
pub fn payment_reference(cotisation_id: Uuid) -> String {
  let simple = cotisation_id.simple().to_string();
  format!("COT-{}", simple[..8].to_uppercase())
}

fn invalid(from: CotisationStatus, to: CotisationStatus) -> Error {
  Error::InvalidTransition { from: from.as_str(), to: to.as_str() }
}
