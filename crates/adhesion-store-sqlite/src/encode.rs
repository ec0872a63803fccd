//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with microsecond precision. Enums are stored as their
//! lowercase names. UUIDs are stored as hyphenated lowercase strings. Tallies
//! are stored as compact JSON.

use adhesion_core::{
  cotisation::{
    Cotisation, CotisationKind, CotisationStatus, DisplayAmount, PaymentMethod,
  },
  currency::Currency,
  election::{ElectionResultSubmission, GeographicScope, SubmissionStatus, Tally},
  member::{MemberProfile, MemberRole, MemberStatus},
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Fixed-width UTC form so that text ordering matches time ordering.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ────────────────────────────────────────────────────────────────────

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownValue { column, value: value.to_owned() }
}

pub fn decode_member_status(s: &str) -> Result<MemberStatus> {
  match s {
    "pending" => Ok(MemberStatus::Pending),
    "active" => Ok(MemberStatus::Active),
    "suspended" => Ok(MemberStatus::Suspended),
    other => Err(unknown("members.status", other)),
  }
}

pub fn decode_member_role(s: &str) -> Result<MemberRole> {
  match s {
    "militant" => Ok(MemberRole::Militant),
    "collecteur" => Ok(MemberRole::Collecteur),
    "superviseur" => Ok(MemberRole::Superviseur),
    "administrateur" => Ok(MemberRole::Administrateur),
    other => Err(unknown("members.role", other)),
  }
}

pub fn decode_cotisation_kind(s: &str) -> Result<CotisationKind> {
  match s {
    "monthly" => Ok(CotisationKind::Monthly),
    "annual" => Ok(CotisationKind::Annual),
    "one_time" => Ok(CotisationKind::OneTime),
    other => Err(unknown("cotisations.kind", other)),
  }
}

pub fn decode_payment_method(s: &str) -> Result<PaymentMethod> {
  match s {
    "orange_money" => Ok(PaymentMethod::OrangeMoney),
    "moov_money" => Ok(PaymentMethod::MoovMoney),
    "wave" => Ok(PaymentMethod::Wave),
    "bank_transfer" => Ok(PaymentMethod::BankTransfer),
    other => Err(unknown("cotisations.payment_method", other)),
  }
}

pub fn decode_cotisation_status(s: &str) -> Result<CotisationStatus> {
  match s {
    "pending" => Ok(CotisationStatus::Pending),
    "completed" => Ok(CotisationStatus::Completed),
    "failed" => Ok(CotisationStatus::Failed),
    other => Err(unknown("cotisations.status", other)),
  }
}

pub fn decode_currency(s: &str) -> Result<Currency> {
  match s {
    "XOF" => Ok(Currency::Xof),
    "EUR" => Ok(Currency::Eur),
    "USD" => Ok(Currency::Usd),
    other => Err(unknown("cotisations.display_currency", other)),
  }
}

pub fn decode_submission_status(s: &str) -> Result<SubmissionStatus> {
  match s {
    "pending" => Ok(SubmissionStatus::Pending),
    "verified" => Ok(SubmissionStatus::Verified),
    "rejected" => Ok(SubmissionStatus::Rejected),
    other => Err(unknown("election_results.status", other)),
  }
}

// ─── Tally ────────────────────────────────────────────────────────────────────

pub fn encode_tally(t: &Tally) -> Result<String> { Ok(serde_json::to_string(t)?) }

pub fn decode_tally(s: &str) -> Result<Tally> { Ok(serde_json::from_str(s)?) }

// ─── Raw rows ─────────────────────────────────────────────────────────────────

pub const MEMBER_COLUMNS: &str = "member_id, account_id, membership_number, full_name, \
   national_id, commune, profession, phone, email, status, role, previous_status, \
   status_reason, identity_credential, credential_issued_at, created_at, updated_at";

/// A `members` row as read from SQLite, before decoding.
pub struct RawMember {
  pub member_id:            String,
  pub account_id:           String,
  pub membership_number:    String,
  pub full_name:            String,
  pub national_id:          Option<String>,
  pub commune:              String,
  pub profession:           String,
  pub phone:                String,
  pub email:                Option<String>,
  pub status:               String,
  pub role:                 String,
  pub previous_status:      Option<String>,
  pub status_reason:        Option<String>,
  pub identity_credential:  String,
  pub credential_issued_at: String,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawMember {
  /// Read a row selected with [`MEMBER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:            row.get(0)?,
      account_id:           row.get(1)?,
      membership_number:    row.get(2)?,
      full_name:            row.get(3)?,
      national_id:          row.get(4)?,
      commune:              row.get(5)?,
      profession:           row.get(6)?,
      phone:                row.get(7)?,
      email:                row.get(8)?,
      status:               row.get(9)?,
      role:                 row.get(10)?,
      previous_status:      row.get(11)?,
      status_reason:        row.get(12)?,
      identity_credential:  row.get(13)?,
      credential_issued_at: row.get(14)?,
      created_at:           row.get(15)?,
      updated_at:           row.get(16)?,
    })
  }

  pub fn into_profile(self) -> Result<MemberProfile> {
    Ok(MemberProfile {
      member_id:            decode_uuid(&self.member_id)?,
      account_id:           self.account_id,
      membership_number:    self.membership_number,
      full_name:            self.full_name,
      national_id:          self.national_id,
      commune:              self.commune,
      profession:           self.profession,
      phone:                self.phone,
      email:                self.email,
      status:               decode_member_status(&self.status)?,
      role:                 decode_member_role(&self.role)?,
      previous_status:      self
        .previous_status
        .as_deref()
        .map(decode_member_status)
        .transpose()?,
      status_reason:        self.status_reason,
      identity_credential:  self.identity_credential,
      credential_issued_at: decode_dt(&self.credential_issued_at)?,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

pub const COTISATION_COLUMNS: &str = "cotisation_id, member_id, amount, display_currency, \
   display_amount, kind, payment_method, status, transaction_ref, paid_at, failure_reason, \
   created_at, updated_at";

pub struct RawCotisation {
  pub cotisation_id:    String,
  pub member_id:        String,
  pub amount:           i64,
  pub display_currency: Option<String>,
  pub display_amount:   Option<i64>,
  pub kind:             String,
  pub payment_method:   String,
  pub status:           String,
  pub transaction_ref:  Option<String>,
  pub paid_at:          Option<String>,
  pub failure_reason:   Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawCotisation {
  /// Read a row selected with [`COTISATION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cotisation_id:    row.get(0)?,
      member_id:        row.get(1)?,
      amount:           row.get(2)?,
      display_currency: row.get(3)?,
      display_amount:   row.get(4)?,
      kind:             row.get(5)?,
      payment_method:   row.get(6)?,
      status:           row.get(7)?,
      transaction_ref:  row.get(8)?,
      paid_at:          row.get(9)?,
      failure_reason:   row.get(10)?,
      created_at:       row.get(11)?,
      updated_at:       row.get(12)?,
    })
  }

  pub fn into_cotisation(self) -> Result<Cotisation> {
    let display = match (self.display_currency, self.display_amount) {
      (Some(currency), Some(amount)) => Some(DisplayAmount {
        currency: decode_currency(&currency)?,
        amount,
      }),
      _ => None,
    };

    Ok(Cotisation {
      cotisation_id:   decode_uuid(&self.cotisation_id)?,
      member_id:       decode_uuid(&self.member_id)?,
      amount:          self.amount,
      display,
      kind:            decode_cotisation_kind(&self.kind)?,
      payment_method:  decode_payment_method(&self.payment_method)?,
      status:          decode_cotisation_status(&self.status)?,
      transaction_ref: self.transaction_ref,
      paid_at:         decode_opt_dt(self.paid_at)?,
      failure_reason:  self.failure_reason,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

pub const SUBMISSION_COLUMNS: &str = "result_id, member_id, election_type, region, cercle, \
   commune, bureau_vote, results_json, evidence_ref, status, submitted_at, reviewed_at";

pub struct RawSubmission {
  pub result_id:     String,
  pub member_id:     String,
  pub election_type: String,
  pub region:        String,
  pub cercle:        String,
  pub commune:       String,
  pub bureau_vote:   String,
  pub results_json:  String,
  pub evidence_ref:  Option<String>,
  pub status:        String,
  pub submitted_at:  String,
  pub reviewed_at:   Option<String>,
}

impl RawSubmission {
  /// Read a row selected with [`SUBMISSION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      result_id:     row.get(0)?,
      member_id:     row.get(1)?,
      election_type: row.get(2)?,
      region:        row.get(3)?,
      cercle:        row.get(4)?,
      commune:       row.get(5)?,
      bureau_vote:   row.get(6)?,
      results_json:  row.get(7)?,
      evidence_ref:  row.get(8)?,
      status:        row.get(9)?,
      submitted_at:  row.get(10)?,
      reviewed_at:   row.get(11)?,
    })
  }

  pub fn into_submission(self) -> Result<ElectionResultSubmission> {
    Ok(ElectionResultSubmission {
      result_id:     decode_uuid(&self.result_id)?,
      member_id:     decode_uuid(&self.member_id)?,
      election_type: self.election_type,
      scope:         GeographicScope {
        region:      self.region,
        cercle:      self.cercle,
        commune:     self.commune,
        bureau_vote: self.bureau_vote,
      },
      results:       decode_tally(&self.results_json)?,
      evidence_ref:  self.evidence_ref,
      status:        decode_submission_status(&self.status)?,
      submitted_at:  decode_dt(&self.submitted_at)?,
      reviewed_at:   decode_opt_dt(self.reviewed_at)?,
    })
  }
}
