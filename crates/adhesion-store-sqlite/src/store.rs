//! [`SqliteStore`]: the SQLite implementation of [`MembershipStore`].

use std::{path::Path, time::Duration};

use adhesion_core::{
  cotisation::{Cotisation, CotisationStatus, NewCotisation, Settlement},
  election::{
    ElectionResultSubmission, NewSubmission, ReviewDecision, SubmissionQuery,
    SubmissionStatus,
  },
  member::{
    ContactUpdate, CredentialRenewal, MemberProfile, MemberQuery, MemberRole,
    MemberStatus, NewMember, StatusChange,
  },
  store::{MemberInsert, MembershipStore, Transition},
};
use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, functions::FunctionFlags};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    COTISATION_COLUMNS, MEMBER_COLUMNS, RawCotisation, RawMember, RawSubmission,
    SUBMISSION_COLUMNS, encode_dt, encode_tally, encode_uuid,
  },
  schema::SCHEMA,
};

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Raw outcomes ─────────────────────────────────────────────────────────────

/// Outcomes produced on the database thread, decoded afterwards.
enum RawInsert {
  Created,
  AccountTaken(RawMember),
  NumberTaken,
}

enum RawTransition<R> {
  Applied(R),
  Stale(R),
  Missing,
}

impl<R> RawTransition<R> {
  fn decode<T>(self, f: impl FnOnce(R) -> Result<T>) -> Result<Transition<T>> {
    Ok(match self {
      Self::Applied(r) => Transition::Applied(f(r)?),
      Self::Stale(r) => Transition::Stale(f(r)?),
      Self::Missing => Transition::Missing,
    })
  }
}

/// Timestamps are stored with microsecond precision; values handed back to
/// callers are truncated the same way so they compare equal after a re-read.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Adhesion store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// statement runs on the connection's dedicated thread, and each guarded
/// write is a single statement, so concurrent requests cannot interleave
/// inside a check-and-update.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // SQLite's lower() only folds ASCII; member search needs "É" == "é".
        conn.create_scalar_function(
          "unicode_lower",
          1,
          FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
          |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one member matching `column = value`.
  async fn fetch_member(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<MemberProfile>> {
    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE {column} = ?1"),
            rusqlite::params![value],
            RawMember::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMember::into_profile).transpose()
  }
}

// ─── MembershipStore impl ────────────────────────────────────────────────────

impl MembershipStore for SqliteStore {
  type Error = Error;

  // ── Sequences ─────────────────────────────────────────────────────────────

  async fn next_sequence(&self, name: &'static str) -> Result<u64> {
    let value: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO sequences (name, value) VALUES (?1, 1)
           ON CONFLICT(name) DO UPDATE SET value = value + 1
           RETURNING value",
          rusqlite::params![name],
          |row| row.get(0),
        )?)
      })
      .await?;

    u64::try_from(value).map_err(|_| Error::SequenceOverflow(name.to_owned()))
  }

  // ── Members ───────────────────────────────────────────────────────────────

  async fn insert_member(&self, input: NewMember) -> Result<MemberInsert> {
    let at = now();
    let profile = MemberProfile {
      member_id:            Uuid::new_v4(),
      account_id:           input.account_id,
      membership_number:    input.membership_number,
      full_name:            input.registration.full_name,
      national_id:          input.registration.national_id,
      commune:              input.registration.commune,
      profession:           input.registration.profession,
      phone:                input.registration.phone,
      email:                input.registration.email,
      status:               MemberStatus::Pending,
      role:                 MemberRole::default(),
      previous_status:      None,
      status_reason:        None,
      identity_credential:  input.identity_credential,
      credential_issued_at: input.credential_issued_at.trunc_subsecs(6),
      created_at:           at,
      updated_at:           at,
    };

    let id_str      = encode_uuid(profile.member_id);
    let account     = profile.account_id.clone();
    let number      = profile.membership_number.clone();
    let full_name   = profile.full_name.clone();
    let national_id = profile.national_id.clone();
    let commune     = profile.commune.clone();
    let profession  = profile.profession.clone();
    let phone       = profile.phone.clone();
    let email       = profile.email.clone();
    let status_str  = profile.status.as_str();
    let role_str    = profile.role.as_str();
    let credential  = profile.identity_credential.clone();
    let issued_str  = encode_dt(profile.credential_issued_at);
    let at_str      = encode_dt(at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Both UNIQUE constraints are checked by the insert itself; a clash
        // on either leaves the table untouched.
        let inserted = tx.execute(
          "INSERT INTO members (
             member_id, account_id, membership_number, full_name, national_id,
             commune, profession, phone, email, status, role,
             identity_credential, credential_issued_at, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            id_str,
            account,
            number,
            full_name,
            national_id,
            commune,
            profession,
            phone,
            email,
            status_str,
            role_str,
            credential,
            issued_str,
            at_str,
          ],
        )?;

        let outcome = if inserted == 1 {
          RawInsert::Created
        } else {
          let existing = tx
            .query_row(
              &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE account_id = ?1"),
              rusqlite::params![account],
              RawMember::from_row,
            )
            .optional()?;
          match existing {
            Some(raw) => RawInsert::AccountTaken(raw),
            None => RawInsert::NumberTaken,
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(match outcome {
      RawInsert::Created => MemberInsert::Created(profile),
      RawInsert::AccountTaken(raw) => MemberInsert::AccountTaken(raw.into_profile()?),
      RawInsert::NumberTaken => MemberInsert::NumberTaken(profile.membership_number),
    })
  }

  async fn get_member(&self, member_id: Uuid) -> Result<Option<MemberProfile>> {
    self.fetch_member("member_id", encode_uuid(member_id)).await
  }

  async fn get_member_by_account(&self, account_id: String) -> Result<Option<MemberProfile>> {
    self.fetch_member("account_id", account_id).await
  }

  async fn get_member_by_number(
    &self,
    membership_number: String,
  ) -> Result<Option<MemberProfile>> {
    self.fetch_member("membership_number", membership_number).await
  }

  async fn update_member_contact(
    &self,
    account_id: String,
    update: ContactUpdate,
  ) -> Result<Option<MemberProfile>> {
    let at_str = encode_dt(now());

    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE members SET
                 full_name  = COALESCE(?2, full_name),
                 commune    = COALESCE(?3, commune),
                 profession = COALESCE(?4, profession),
                 phone      = COALESCE(?5, phone),
                 email      = CASE WHEN ?6 IS NULL THEN email ELSE NULLIF(?6, '') END,
                 updated_at = ?7
               WHERE account_id = ?1
               RETURNING {MEMBER_COLUMNS}"
            ),
            rusqlite::params![
              account_id,
              update.full_name,
              update.commune,
              update.profession,
              update.phone,
              update.email,
              at_str,
            ],
            RawMember::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMember::into_profile).transpose()
  }

  async fn transition_member_status(
    &self,
    member_id: Uuid,
    change: StatusChange,
  ) -> Result<Transition<MemberProfile>> {
    let id_str   = encode_uuid(member_id);
    let from_str = change.from.as_str();
    let to_str   = change.to.as_str();
    let reason   = change.reason;
    let at_str   = encode_dt(now());

    let raw: RawTransition<RawMember> = self
      .conn
      .call(move |conn| {
        let applied = conn
          .query_row(
            &format!(
              "UPDATE members
               SET status = ?3, previous_status = ?2, status_reason = ?4, updated_at = ?5
               WHERE member_id = ?1 AND status = ?2
               RETURNING {MEMBER_COLUMNS}"
            ),
            rusqlite::params![id_str, from_str, to_str, reason, at_str],
            RawMember::from_row,
          )
          .optional()?;
        if let Some(raw) = applied {
          return Ok(RawTransition::Applied(raw));
        }

        let current = conn
          .query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE member_id = ?1"),
            rusqlite::params![id_str],
            RawMember::from_row,
          )
          .optional()?;
        Ok(current.map_or(RawTransition::Missing, RawTransition::Stale))
      })
      .await?;

    raw.decode(RawMember::into_profile)
  }

  async fn set_member_role(
    &self,
    member_id: Uuid,
    role: MemberRole,
  ) -> Result<Option<MemberProfile>> {
    let id_str   = encode_uuid(member_id);
    let role_str = role.as_str();
    let at_str   = encode_dt(now());

    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE members SET role = ?2, updated_at = ?3
               WHERE member_id = ?1
               RETURNING {MEMBER_COLUMNS}"
            ),
            rusqlite::params![id_str, role_str, at_str],
            RawMember::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMember::into_profile).transpose()
  }

  async fn replace_credential(
    &self,
    member_id: Uuid,
    renewal: CredentialRenewal,
  ) -> Result<Transition<MemberProfile>> {
    let id_str     = encode_uuid(member_id);
    let status_str = renewal.status.as_str();
    let full_name  = renewal.full_name;
    let credential = renewal.credential;
    let issued_str = encode_dt(renewal.issued_at);
    let at_str     = encode_dt(now());

    let raw: RawTransition<RawMember> = self
      .conn
      .call(move |conn| {
        let applied = conn
          .query_row(
            &format!(
              "UPDATE members
               SET identity_credential = ?2, credential_issued_at = ?3, updated_at = ?4
               WHERE member_id = ?1 AND status = ?5 AND full_name = ?6
               RETURNING {MEMBER_COLUMNS}"
            ),
            rusqlite::params![
              id_str, credential, issued_str, at_str, status_str, full_name
            ],
            RawMember::from_row,
          )
          .optional()?;
        if let Some(raw) = applied {
          return Ok(RawTransition::Applied(raw));
        }

        let current = conn
          .query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE member_id = ?1"),
            rusqlite::params![id_str],
            RawMember::from_row,
          )
          .optional()?;
        Ok(current.map_or(RawTransition::Missing, RawTransition::Stale))
      })
      .await?;

    raw.decode(RawMember::into_profile)
  }

  async fn list_members(&self, query: &MemberQuery) -> Result<Vec<MemberProfile>> {
    let status_str = query.status.map(MemberStatus::as_str);
    let needle = query.text.as_deref().map(str::to_lowercase);
    // A negative LIMIT means no limit in SQLite.
    let limit = query
      .limit
      .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset = query
      .offset
      .map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));

    let raws: Vec<RawMember> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MEMBER_COLUMNS} FROM members
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL
                  OR instr(unicode_lower(full_name), ?2) > 0
                  OR instr(unicode_lower(membership_number), ?2) > 0
                  OR instr(unicode_lower(commune), ?2) > 0)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![status_str, needle, limit, offset],
            RawMember::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMember::into_profile).collect()
  }

  // ── Cotisations ───────────────────────────────────────────────────────────

  async fn insert_cotisation(&self, input: NewCotisation) -> Result<Cotisation> {
    let at = now();
    let cotisation = Cotisation {
      cotisation_id:   Uuid::new_v4(),
      member_id:       input.member_id,
      amount:          input.amount,
      display:         input.display,
      kind:            input.kind,
      payment_method:  input.payment_method,
      status:          CotisationStatus::Pending,
      transaction_ref: None,
      paid_at:         None,
      failure_reason:  None,
      created_at:      at,
      updated_at:      at,
    };

    let id_str       = encode_uuid(cotisation.cotisation_id);
    let member_str   = encode_uuid(cotisation.member_id);
    let amount       = cotisation.amount;
    let display_cur  = cotisation.display.map(|d| d.currency.code());
    let display_amt  = cotisation.display.map(|d| d.amount);
    let kind_str     = cotisation.kind.as_str();
    let method_str   = cotisation.payment_method.as_str();
    let status_str   = cotisation.status.as_str();
    let at_str       = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cotisations (
             cotisation_id, member_id, amount, display_currency, display_amount,
             kind, payment_method, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            id_str,
            member_str,
            amount,
            display_cur,
            display_amt,
            kind_str,
            method_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(cotisation)
  }

  async fn get_cotisation(&self, cotisation_id: Uuid) -> Result<Option<Cotisation>> {
    let id_str = encode_uuid(cotisation_id);

    let raw: Option<RawCotisation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {COTISATION_COLUMNS} FROM cotisations WHERE cotisation_id = ?1"),
            rusqlite::params![id_str],
            RawCotisation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCotisation::into_cotisation).transpose()
  }

  async fn settle_cotisation(
    &self,
    cotisation_id: Uuid,
    settlement: Settlement,
  ) -> Result<Transition<Cotisation>> {
    let id_str     = encode_uuid(cotisation_id);
    let status_str = settlement.status().as_str();
    let at_str     = encode_dt(now());
    let (transaction_ref, failure_reason) = match settlement {
      Settlement::Completed { transaction_ref } => (Some(transaction_ref), None),
      Settlement::Failed { reason } => (None, reason),
    };

    let raw: RawTransition<RawCotisation> = self
      .conn
      .call(move |conn| {
        let applied = conn
          .query_row(
            &format!(
              "UPDATE cotisations
               SET status          = ?2,
                   transaction_ref = ?3,
                   failure_reason  = ?4,
                   paid_at         = CASE WHEN ?2 = 'completed' THEN ?5 END,
                   updated_at      = ?5
               WHERE cotisation_id = ?1 AND status = 'pending'
               RETURNING {COTISATION_COLUMNS}"
            ),
            rusqlite::params![id_str, status_str, transaction_ref, failure_reason, at_str],
            RawCotisation::from_row,
          )
          .optional()?;
        if let Some(raw) = applied {
          return Ok(RawTransition::Applied(raw));
        }

        let current = conn
          .query_row(
            &format!("SELECT {COTISATION_COLUMNS} FROM cotisations WHERE cotisation_id = ?1"),
            rusqlite::params![id_str],
            RawCotisation::from_row,
          )
          .optional()?;
        Ok(current.map_or(RawTransition::Missing, RawTransition::Stale))
      })
      .await?;

    raw.decode(RawCotisation::into_cotisation)
  }

  async fn list_cotisations(&self, member_id: Uuid) -> Result<Vec<Cotisation>> {
    let member_str = encode_uuid(member_id);

    let raws: Vec<RawCotisation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COTISATION_COLUMNS} FROM cotisations
           WHERE member_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![member_str], RawCotisation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCotisation::into_cotisation).collect()
  }

  // ── Election results ──────────────────────────────────────────────────────

  async fn insert_submission(&self, input: NewSubmission) -> Result<ElectionResultSubmission> {
    let submission = ElectionResultSubmission {
      result_id:     Uuid::new_v4(),
      member_id:     input.member_id,
      election_type: input.election_type,
      scope:         input.scope,
      results:       input.results,
      evidence_ref:  input.evidence_ref,
      status:        SubmissionStatus::Pending,
      submitted_at:  now(),
      reviewed_at:   None,
    };

    let id_str        = encode_uuid(submission.result_id);
    let member_str    = encode_uuid(submission.member_id);
    let election_type = submission.election_type.clone();
    let region        = submission.scope.region.clone();
    let cercle        = submission.scope.cercle.clone();
    let commune       = submission.scope.commune.clone();
    let bureau_vote   = submission.scope.bureau_vote.clone();
    let results_json  = encode_tally(&submission.results)?;
    let evidence_ref  = submission.evidence_ref.clone();
    let status_str    = submission.status.as_str();
    let at_str        = encode_dt(submission.submitted_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO election_results (
             result_id, member_id, election_type, region, cercle, commune,
             bureau_vote, results_json, evidence_ref, status, submitted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            member_str,
            election_type,
            region,
            cercle,
            commune,
            bureau_vote,
            results_json,
            evidence_ref,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(submission)
  }

  async fn get_submission(&self, result_id: Uuid) -> Result<Option<ElectionResultSubmission>> {
    let id_str = encode_uuid(result_id);

    let raw: Option<RawSubmission> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM election_results WHERE result_id = ?1"),
            rusqlite::params![id_str],
            RawSubmission::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn list_submissions(
    &self,
    query: &SubmissionQuery,
  ) -> Result<Vec<ElectionResultSubmission>> {
    let status_str = query.status.map(SubmissionStatus::as_str);
    let member_str = query.member_id.map(encode_uuid);

    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBMISSION_COLUMNS} FROM election_results
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR member_id = ?2)
           ORDER BY submitted_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str, member_str], RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn review_submission(
    &self,
    result_id: Uuid,
    decision: ReviewDecision,
  ) -> Result<Transition<ElectionResultSubmission>> {
    let id_str     = encode_uuid(result_id);
    let status_str = decision.status().as_str();
    let at_str     = encode_dt(now());

    let raw: RawTransition<RawSubmission> = self
      .conn
      .call(move |conn| {
        let applied = conn
          .query_row(
            &format!(
              "UPDATE election_results
               SET status = ?2, reviewed_at = ?3
               WHERE result_id = ?1 AND status = 'pending'
               RETURNING {SUBMISSION_COLUMNS}"
            ),
            rusqlite::params![id_str, status_str, at_str],
            RawSubmission::from_row,
          )
          .optional()?;
        if let Some(raw) = applied {
          return Ok(RawTransition::Applied(raw));
        }

        let current = conn
          .query_row(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM election_results WHERE result_id = ?1"),
            rusqlite::params![id_str],
            RawSubmission::from_row,
          )
          .optional()?;
        Ok(current.map_or(RawTransition::Missing, RawTransition::Stale))
      })
      .await?;

    raw.decode(RawSubmission::into_submission)
  }
}
