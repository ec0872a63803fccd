//! Cotisations: dues payment intents and their settlement.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;

/// Billing period of a cotisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CotisationKind {
  Monthly,
  Annual,
  #[serde(alias = "one-time")]
  OneTime,
}

impl CotisationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Monthly => "monthly",
      Self::Annual => "annual",
      Self::OneTime => "one_time",
    }
  }
}

/// How the member pays. The three mobile-money providers are dialled through
/// a USSD access code; bank transfers go to a fixed account reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  OrangeMoney,
  MoovMoney,
  Wave,
  BankTransfer,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::OrangeMoney => "orange_money",
      Self::MoovMoney => "moov_money",
      Self::Wave => "wave",
      Self::BankTransfer => "bank_transfer",
    }
  }

  /// Name shown to the member.
  pub fn display_name(self) -> &'static str {
    match self {
      Self::OrangeMoney => "Orange Money",
      Self::MoovMoney => "Moov Money",
      Self::Wave => "Wave",
      Self::BankTransfer => "Virement bancaire",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CotisationStatus {
  Pending,
  Completed,
  Failed,
}

impl CotisationStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for CotisationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What the member saw on screen. Presentation metadata only; never used to
/// compute or validate the stored amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayAmount {
  pub currency: Currency,
  pub amount:   i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cotisation {
  pub cotisation_id:   Uuid,
  pub member_id:       Uuid,
  /// Amount in the canonical currency.
  pub amount:          i64,
  pub display:         Option<DisplayAmount>,
  pub kind:            CotisationKind,
  pub payment_method:  PaymentMethod,
  pub status:          CotisationStatus,
  /// External provider transaction id, set on settlement.
  pub transaction_ref: Option<String>,
  pub paid_at:         Option<DateTime<Utc>>,
  pub failure_reason:  Option<String>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// Input to [`crate::store::MembershipStore::insert_cotisation`].
#[derive(Debug, Clone)]
pub struct NewCotisation {
  pub member_id:      Uuid,
  pub amount:         i64,
  pub display:        Option<DisplayAmount>,
  pub kind:           CotisationKind,
  pub payment_method: PaymentMethod,
}

/// Terminal outcome applied to a pending cotisation.
#[derive(Debug, Clone)]
pub enum Settlement {
  Completed { transaction_ref: String },
  Failed { reason: Option<String> },
}

impl Settlement {
  pub fn status(&self) -> CotisationStatus {
    match self {
      Self::Completed { .. } => CotisationStatus::Completed,
      Self::Failed { .. } => CotisationStatus::Failed,
    }
  }
}
