//! Election-observation field reports.
//!
//! A member submits the tallies observed at one polling station; an
//! administrator reviews the submission exactly once.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Result, error::require};

/// Candidate (or list) name → vote count.
pub type Tally = BTreeMap<String, i64>;

// ─── Scope ───────────────────────────────────────────────────────────────────

/// Administrative location of a polling station, coarsest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicScope {
  pub region:      String,
  pub cercle:      String,
  pub commune:     String,
  pub bureau_vote: String,
}

impl GeographicScope {
  pub fn validate(&self) -> Result<()> {
    require("region", &self.region)?;
    require("cercle", &self.cercle)?;
    require("commune", &self.commune)?;
    require("bureau_vote", &self.bureau_vote)?;
    Ok(())
  }

  pub fn normalized(self) -> Self {
    Self {
      region:      self.region.trim().to_owned(),
      cercle:      self.cercle.trim().to_owned(),
      commune:     self.commune.trim().to_owned(),
      bureau_vote: self.bureau_vote.trim().to_owned(),
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
  Pending,
  Verified,
  Rejected,
}

impl SubmissionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Verified => "verified",
      Self::Rejected => "rejected",
    }
  }

  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }
}

impl fmt::Display for SubmissionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An administrator's verdict on a pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
  Verified,
  Rejected,
}

impl ReviewDecision {
  pub fn status(self) -> SubmissionStatus {
    match self {
      Self::Verified => SubmissionStatus::Verified,
      Self::Rejected => SubmissionStatus::Rejected,
    }
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResultSubmission {
  pub result_id:     Uuid,
  /// The submitting member.
  pub member_id:     Uuid,
  pub election_type: String,
  #[serde(flatten)]
  pub scope:         GeographicScope,
  pub results:       Tally,
  /// Opaque reference to photographic evidence held elsewhere.
  pub evidence_ref:  Option<String>,
  pub status:        SubmissionStatus,
  pub submitted_at:  DateTime<Utc>,
  pub reviewed_at:   Option<DateTime<Utc>>,
}

/// Input to [`crate::store::MembershipStore::insert_submission`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub member_id:     Uuid,
  pub election_type: String,
  pub scope:         GeographicScope,
  pub results:       Tally,
  pub evidence_ref:  Option<String>,
}

/// Filter for [`crate::store::MembershipStore::list_submissions`].
#[derive(Debug, Clone, Default)]
pub struct SubmissionQuery {
  pub status:    Option<SubmissionStatus>,
  pub member_id: Option<Uuid>,
}

// ─── Tally coercion ──────────────────────────────────────────────────────────

/// Coerce a loosely-typed results payload into a [`Tally`].
///
/// Keys are kept verbatim. Integers are taken as-is, fractional numbers are
/// truncated, numeric strings are parsed; anything else counts as `0`.
pub fn coerce_tally(raw: &serde_json::Map<String, Value>) -> Tally {
  raw
    .iter()
    .map(|(candidate, value)| (candidate.clone(), coerce_count(value)))
    .collect()
}

fn coerce_count(value: &Value) -> i64 {
  match value {
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
      .unwrap_or(0),
    Value::String(s) => {
      let s = s.trim();
      s.parse::<i64>()
        .ok()
        .or_else(|| {
          s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
        })
        .unwrap_or(0)
    }
    _ => 0,
  }
}
