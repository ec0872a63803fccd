//! Fixed-rate currency conversion.
//!
//! Amounts of record are always in [`CANONICAL`] (West African CFA franc).
//! Other currencies exist only for display: the client converts what the
//! member typed into the canonical currency before initiating a cotisation,
//! and converts stored amounts back when rendering them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Currencies the client may display amounts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
  Xof,
  Eur,
  Usd,
}

/// The currency every stored amount is expressed in.
pub const CANONICAL: Currency = Currency::Xof;

impl Currency {
  pub fn code(self) -> &'static str {
    match self {
      Self::Xof => "XOF",
      Self::Eur => "EUR",
      Self::Usd => "USD",
    }
  }
}

impl fmt::Display for Currency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// Exchange rates expressed as canonical units per one unit of each currency.
///
/// The EUR rate is the fixed CFA peg (1 EUR = 655.957 XOF). The USD rate is a
/// configured reference value, not a live quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTable {
  pub eur: f64,
  pub usd: f64,
}

impl Default for RateTable {
  fn default() -> Self { Self { eur: 655.957, usd: 600.0 } }
}

impl RateTable {
  pub fn validate(&self) -> Result<()> {
    for (field, rate) in [("rates.eur", self.eur), ("rates.usd", self.usd)] {
      if !rate.is_finite() || rate <= 0.0 {
        return Err(Error::validation(field, "rate must be a positive number"));
      }
    }
    Ok(())
  }

  /// Canonical units per one unit of `currency`.
  pub fn canonical_per_unit(&self, currency: Currency) -> f64 {
    match currency {
      Currency::Xof => 1.0,
      Currency::Eur => self.eur,
      Currency::Usd => self.usd,
    }
  }

  /// Convert `amount` from one currency to another. No rounding is applied.
  pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> f64 {
    if from == to {
      return amount;
    }
    amount * self.canonical_per_unit(from) / self.canonical_per_unit(to)
  }

  /// Convert a canonical amount for display, rounded to the nearest whole
  /// unit of `to`.
  pub fn display_amount(&self, canonical: i64, to: Currency) -> i64 {
    self.convert(canonical as f64, CANONICAL, to).round() as i64
  }
}
