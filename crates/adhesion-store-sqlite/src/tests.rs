//! Integration tests for `SqliteStore` and the core workflows running on it,
//! against an in-memory database.

use std::{collections::HashSet, sync::Arc};

use adhesion_core::{
  Error as CoreError,
  cotisation::{CotisationKind, CotisationStatus, DisplayAmount, PaymentMethod, Settlement},
  currency::{Currency, RateTable},
  dues::DuesWorkflow,
  election::{GeographicScope, ReviewDecision, SubmissionStatus},
  identity::{IdentityAllocator, IdentityConfig, MEMBERSHIP_SEQUENCE, parse_membership_number},
  instructions::DuesConfig,
  member::{
    ContactUpdate, CredentialRenewal, MemberQuery, MemberRole, MemberStatus, NewMember,
    Registration, StatusChange,
  },
  registry::MemberRegistry,
  reports::FieldReportWorkflow,
  store::{MemberInsert, MembershipStore, Transition},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn identity_config() -> IdentityConfig {
  IdentityConfig {
    prefix:         "ADH".into(),
    width:          6,
    credential_key: "test-key".into(),
  }
}

fn registry(store: &Arc<SqliteStore>) -> MemberRegistry<SqliteStore> {
  let identity = IdentityAllocator::new(store.clone(), identity_config());
  MemberRegistry::new(store.clone(), identity)
}

fn dues(store: &Arc<SqliteStore>) -> DuesWorkflow<SqliteStore> {
  DuesWorkflow::new(store.clone(), DuesConfig::default(), RateTable::default())
}

fn registration(name: &str, commune: &str) -> Registration {
  Registration {
    full_name:   name.into(),
    national_id: None,
    commune:     commune.into(),
    profession:  "Commerçante".into(),
    phone:       "+223 76 12 34 56".into(),
    email:       None,
  }
}

// ─── Sequences ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn sequence_starts_at_one_and_increments() {
  let s = store().await;
  assert_eq!(s.next_sequence(MEMBERSHIP_SEQUENCE).await.unwrap(), 1);
  assert_eq!(s.next_sequence(MEMBERSHIP_SEQUENCE).await.unwrap(), 2);
  assert_eq!(s.next_sequence("other").await.unwrap(), 1);
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_public_lookup() {
  let s = store().await;
  let r = registry(&s);

  let profile = r
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();

  assert_eq!(profile.status, MemberStatus::Pending);
  assert_eq!(profile.role, MemberRole::Militant);
  assert!(parse_membership_number("ADH", &profile.membership_number).is_some());
  assert_eq!(profile.membership_number.len(), "ADH-000001".len());
  assert!(!profile.identity_credential.is_empty());

  let card = r.get_by_membership_number(&profile.membership_number).await.unwrap();
  assert_eq!(card.status, MemberStatus::Pending);
  assert_eq!(card.full_name, "Fatou Traoré");
  assert_eq!(card.commune, "Bamako");
  assert_eq!(card.identity_credential, profile.identity_credential);

  let payload = r.verify_credential(&card.identity_credential).unwrap();
  assert_eq!(payload.membership_number, profile.membership_number);
  assert_eq!(payload.status, MemberStatus::Pending);
}

#[tokio::test]
async fn second_registration_for_account_conflicts() {
  let s = store().await;
  let r = registry(&s);

  let first = r
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let err = r
    .register("acct-1", registration("Someone Else", "Ségou"))
    .await
    .unwrap_err();

  match err {
    CoreError::AlreadyRegistered { membership_number } => {
      assert_eq!(membership_number, first.membership_number)
    }
    other => panic!("expected AlreadyRegistered, got {other:?}"),
  }
  assert_eq!(r.list(MemberQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_registrations_get_distinct_numbers() {
  let s = store().await;
  let r = registry(&s);

  let handles: Vec<_> = (0..32)
    .map(|i| {
      let r = r.clone();
      tokio::spawn(async move {
        r.register(&format!("acct-{i}"), registration(&format!("Membre {i}"), "Sikasso"))
          .await
      })
    })
    .collect();

  let mut numbers = HashSet::new();
  for h in handles {
    let profile = h.await.unwrap().unwrap();
    assert!(numbers.insert(profile.membership_number));
  }
  assert_eq!(numbers.len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registrations_through_two_connections_to_one_file_get_distinct_numbers() {
  let path = std::env::temp_dir().join(format!("adhesion-{}.db", Uuid::new_v4()));
  let first = Arc::new(SqliteStore::open(&path).await.unwrap());
  let second = Arc::new(SqliteStore::open(&path).await.unwrap());
  let registries = [registry(&first), registry(&second)];

  let handles: Vec<_> = (0..24)
    .map(|i| {
      let r = registries[i % 2].clone();
      tokio::spawn(async move {
        r.register(&format!("acct-{i}"), registration(&format!("Membre {i}"), "Koulikoro"))
          .await
      })
    })
    .collect();

  let mut numbers = HashSet::new();
  for h in handles {
    let profile = h.await.unwrap().unwrap();
    assert!(numbers.insert(profile.membership_number));
  }
  assert_eq!(numbers.len(), 24);
  assert_eq!(first.next_sequence(MEMBERSHIP_SEQUENCE).await.unwrap(), 25);

  drop((first, second, registries));
  for suffix in ["", "-wal", "-shm"] {
    let mut file = path.clone().into_os_string();
    file.push(suffix);
    let _ = std::fs::remove_file(file);
  }
}

#[tokio::test]
async fn concurrent_registrations_for_one_account_create_one_profile() {
  let s = store().await;
  let r = registry(&s);

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let r = r.clone();
      tokio::spawn(async move {
        r.register("acct-same", registration("Awa Diarra", "Mopti")).await
      })
    })
    .collect();

  let mut created = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => created += 1,
      Err(CoreError::AlreadyRegistered { .. }) => {}
      Err(other) => panic!("unexpected error: {other:?}"),
    }
  }
  assert_eq!(created, 1);
  assert_eq!(r.list(MemberQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn insert_reports_taken_number() {
  let s = store().await;
  let now = Utc::now();
  let new = |account: &str| NewMember {
    account_id:           account.into(),
    membership_number:    "ADH-000001".into(),
    registration:         registration("A", "Kati"),
    identity_credential:  "c".into(),
    credential_issued_at: now,
  };

  assert!(matches!(s.insert_member(new("a")).await.unwrap(), MemberInsert::Created(_)));
  assert!(matches!(
    s.insert_member(new("b")).await.unwrap(),
    MemberInsert::NumberTaken(n) if n == "ADH-000001"
  ));
}

#[tokio::test]
async fn registration_skips_numbers_taken_outside_the_counter() {
  let s = store().await;
  // A legacy row already holds the first number the counter will hand out.
  s.insert_member(NewMember {
    account_id:           "legacy".into(),
    membership_number:    "ADH-000001".into(),
    registration:         registration("Ancien", "Kita"),
    identity_credential:  "c".into(),
    credential_issued_at: Utc::now(),
  })
  .await
  .unwrap();

  let profile = registry(&s)
    .register("acct-new", registration("Nouveau", "Kita"))
    .await
    .unwrap();
  assert_eq!(profile.membership_number, "ADH-000002");
}

#[tokio::test]
async fn registration_validates_fields() {
  let s = store().await;
  let err = registry(&s)
    .register("acct-1", registration("", "Bamako"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation { field: "full_name", .. }));
}

#[tokio::test]
async fn unknown_membership_number_is_not_found() {
  let s = store().await;
  let err = registry(&s).get_by_membership_number("ADH-999999").await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

// ─── Contact updates ─────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_update_touches_only_given_fields() {
  let s = store().await;
  let r = registry(&s);
  let before = r
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();

  let after = r
    .update_contact_fields("acct-1", ContactUpdate {
      phone: Some("+223 66 00 00 00".into()),
      email: Some("fatou@example.ml".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(after.phone, "+223 66 00 00 00");
  assert_eq!(after.email.as_deref(), Some("fatou@example.ml"));
  assert_eq!(after.full_name, before.full_name);
  assert_eq!(after.membership_number, before.membership_number);
  assert_eq!(after.status, before.status);

  let cleared = r
    .update_contact_fields("acct-1", ContactUpdate {
      email: Some(String::new()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(cleared.email, None);
}

#[tokio::test]
async fn contact_update_without_profile_is_not_found() {
  let s = store().await;
  let err = registry(&s)
    .update_contact_fields("ghost", ContactUpdate {
      commune: Some("Gao".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

// ─── Status & role ───────────────────────────────────────────────────────────

#[tokio::test]
async fn approve_suspend_reactivate() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();

  let p = r.set_status(p.member_id, MemberStatus::Active, None).await.unwrap();
  assert_eq!(p.status, MemberStatus::Active);
  assert_eq!(p.previous_status, Some(MemberStatus::Pending));

  let p = r
    .set_status(p.member_id, MemberStatus::Suspended, Some("absences".into()))
    .await
    .unwrap();
  assert_eq!(p.status, MemberStatus::Suspended);
  assert_eq!(p.previous_status, Some(MemberStatus::Active));
  assert_eq!(p.status_reason.as_deref(), Some("absences"));

  let p = r.set_status(p.member_id, MemberStatus::Active, None).await.unwrap();
  assert_eq!(p.status, MemberStatus::Active);
}

#[tokio::test]
async fn reject_on_entry_is_distinguishable_from_suspension() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();

  let p = r.set_status(p.member_id, MemberStatus::Suspended, None).await.unwrap();
  assert_eq!(p.status, MemberStatus::Suspended);
  assert_eq!(p.previous_status, Some(MemberStatus::Pending));
}

#[tokio::test]
async fn active_to_pending_is_rejected_and_unchanged() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();
  r.set_status(p.member_id, MemberStatus::Active, None).await.unwrap();

  let err = r
    .set_status(p.member_id, MemberStatus::Pending, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    CoreError::InvalidTransition { from: "active", to: "pending" }
  ));
  assert_eq!(r.get_member(p.member_id).await.unwrap().status, MemberStatus::Active);
}

#[tokio::test]
async fn same_status_is_not_a_transition() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();
  let err = r
    .set_status(p.member_id, MemberStatus::Pending, None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn stale_status_guard_does_not_overwrite() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();

  // First administrator approves.
  r.set_status(p.member_id, MemberStatus::Active, None).await.unwrap();

  // Second administrator acted on the pending snapshot and wants to reject.
  let outcome = s
    .transition_member_status(p.member_id, StatusChange {
      from:   MemberStatus::Pending,
      to:     MemberStatus::Suspended,
      reason: None,
    })
    .await
    .unwrap();
  match outcome {
    Transition::Stale(current) => assert_eq!(current.status, MemberStatus::Active),
    other => panic!("expected Stale, got {other:?}"),
  }
}

#[tokio::test]
async fn concurrent_approvals_have_one_winner() {
  let s = store().await;
  let r = registry(&s);
  let member_id = r
    .register("acct-1", registration("Moussa Keïta", "Kayes"))
    .await
    .unwrap()
    .member_id;

  let handles: Vec<_> = (0..6)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move {
        s.transition_member_status(member_id, StatusChange {
          from:   MemberStatus::Pending,
          to:     MemberStatus::Active,
          reason: None,
        })
        .await
        .unwrap()
      })
    })
    .collect();

  let mut applied = 0;
  for h in handles {
    if let Transition::Applied(_) = h.await.unwrap() {
      applied += 1;
    }
  }
  assert_eq!(applied, 1);
}

#[tokio::test]
async fn set_status_on_unknown_member_is_not_found() {
  let s = store().await;
  let err = registry(&s)
    .set_status(Uuid::new_v4(), MemberStatus::Active, None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn any_role_can_be_assigned() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();

  for role in [
    MemberRole::Superviseur,
    MemberRole::Militant,
    MemberRole::Administrateur,
    MemberRole::Collecteur,
  ] {
    assert_eq!(r.set_role(p.member_id, role).await.unwrap().role, role);
  }
}

#[tokio::test]
async fn credential_is_a_snapshot_until_reissued() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();
  let active = r.set_status(p.member_id, MemberStatus::Active, None).await.unwrap();

  assert_eq!(active.identity_credential, p.identity_credential);
  let stale = r.verify_credential(&active.identity_credential).unwrap();
  assert_eq!(stale.status, MemberStatus::Pending);

  let reissued = r.reissue_credential(p.member_id).await.unwrap();
  assert_ne!(reissued.identity_credential, p.identity_credential);
  let fresh = r.verify_credential(&reissued.identity_credential).unwrap();
  assert_eq!(fresh.status, MemberStatus::Active);
  assert_eq!(fresh.membership_number, p.membership_number);
}

#[tokio::test]
async fn credential_replacement_is_guarded_on_status_and_name() {
  let s = store().await;
  let r = registry(&s);
  let p = r.register("acct-1", registration("Moussa Keïta", "Kayes")).await.unwrap();
  r.set_status(p.member_id, MemberStatus::Active, None).await.unwrap();

  let renewal = |status, name: &str| CredentialRenewal {
    status,
    full_name: name.into(),
    credential: "ADH1.signed-over-old-state.00".into(),
    issued_at: Utc::now(),
  };

  // Signed while the member was still pending.
  match s
    .replace_credential(p.member_id, renewal(MemberStatus::Pending, "Moussa Keïta"))
    .await
    .unwrap()
  {
    Transition::Stale(current) => {
      assert_eq!(current.status, MemberStatus::Active);
      assert_eq!(current.identity_credential, p.identity_credential);
    }
    other => panic!("expected stale, got {other:?}"),
  }

  // Signed over a name that has since changed.
  assert!(matches!(
    s.replace_credential(p.member_id, renewal(MemberStatus::Active, "Moussa Keita"))
      .await
      .unwrap(),
    Transition::Stale(_)
  ));

  assert!(matches!(
    s.replace_credential(Uuid::new_v4(), renewal(MemberStatus::Active, "Moussa Keïta"))
      .await
      .unwrap(),
    Transition::Missing
  ));

  match s
    .replace_credential(p.member_id, renewal(MemberStatus::Active, "Moussa Keïta"))
    .await
    .unwrap()
  {
    Transition::Applied(updated) => {
      assert_eq!(updated.identity_credential, "ADH1.signed-over-old-state.00");
    }
    other => panic!("expected applied, got {other:?}"),
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_text_case_insensitively_and_by_status() {
  let s = store().await;
  let r = registry(&s);
  let fatou = r.register("a1", registration("Fatou Traoré", "Bamako")).await.unwrap();
  r.register("a2", registration("Oumar Sidibé", "Ségou")).await.unwrap();
  let awa = r.register("a3", registration("Awa Traoré", "Kayes")).await.unwrap();
  r.set_status(awa.member_id, MemberStatus::Active, None).await.unwrap();

  let by_name = r
    .list(MemberQuery { text: Some("TRAORÉ".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_name.len(), 2);

  let by_commune = r
    .list(MemberQuery { text: Some("ségou".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_commune.len(), 1);

  let by_number = r
    .list(MemberQuery {
      text: Some(fatou.membership_number.to_lowercase()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_number.len(), 1);
  assert_eq!(by_number[0].member_id, fatou.member_id);

  let active_traore = r
    .list(MemberQuery {
      status: Some(MemberStatus::Active),
      text:   Some("traoré".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(active_traore.len(), 1);
  assert_eq!(active_traore[0].member_id, awa.member_id);
}

#[tokio::test]
async fn list_is_newest_first_and_paginates() {
  let s = store().await;
  let r = registry(&s);
  for i in 0..5 {
    r.register(&format!("a{i}"), registration(&format!("M{i}"), "Gao")).await.unwrap();
  }

  let all = r.list(MemberQuery::default()).await.unwrap();
  assert_eq!(all.first().unwrap().account_id, "a4");
  assert_eq!(all.last().unwrap().account_id, "a0");

  let page = r
    .list(MemberQuery { limit: Some(2), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  let accounts: Vec<_> = page.iter().map(|p| p.account_id.as_str()).collect();
  assert_eq!(accounts, ["a3", "a2"]);
}

// ─── Dues ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn initiate_confirm_and_history() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let d = dues(&s);

  let initiated = d
    .initiate(
      member.member_id,
      5000,
      CotisationKind::Monthly,
      PaymentMethod::OrangeMoney,
      Some(DisplayAmount { currency: Currency::Eur, amount: 8 }),
    )
    .await
    .unwrap();
  assert_eq!(initiated.cotisation.status, CotisationStatus::Pending);
  assert_eq!(initiated.cotisation.amount, 5000);
  assert!(!initiated.instructions.steps.is_empty());
  assert_eq!(initiated.instructions.amount, 5000);

  let id = initiated.cotisation.cotisation_id;
  let confirmed = d.confirm(id, "OM-TX-123").await.unwrap();
  assert_eq!(confirmed.status, CotisationStatus::Completed);
  assert_eq!(confirmed.transaction_ref.as_deref(), Some("OM-TX-123"));
  assert!(confirmed.paid_at.is_some());

  let history = d.history_for_member(member.member_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].cotisation_id, id);
  assert_eq!(history[0].status, CotisationStatus::Completed);
  assert_eq!(
    history[0].display,
    Some(DisplayAmount { currency: Currency::Eur, amount: 8 })
  );
}

#[tokio::test]
async fn confirm_twice_is_idempotent() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let d = dues(&s);
  let c = d
    .initiate(member.member_id, 5000, CotisationKind::Annual, PaymentMethod::Wave, None)
    .await
    .unwrap()
    .cotisation;

  let first = d.confirm(c.cotisation_id, "TX-1").await.unwrap();
  let second = d.confirm(c.cotisation_id, "TX-2").await.unwrap();

  assert_eq!(second.status, CotisationStatus::Completed);
  assert_eq!(second.paid_at, first.paid_at);
  assert_eq!(second.transaction_ref.as_deref(), Some("TX-1"));
}

#[tokio::test]
async fn failed_cotisation_cannot_be_confirmed() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let d = dues(&s);
  let c = d
    .initiate(member.member_id, 1000, CotisationKind::OneTime, PaymentMethod::MoovMoney, None)
    .await
    .unwrap()
    .cotisation;

  let failed = d.mark_failed(c.cotisation_id, Some("solde insuffisant".into())).await.unwrap();
  assert_eq!(failed.status, CotisationStatus::Failed);
  assert_eq!(failed.failure_reason.as_deref(), Some("solde insuffisant"));
  assert!(failed.paid_at.is_none());

  let err = d.confirm(c.cotisation_id, "TX").await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::InvalidTransition { from: "failed", to: "completed" }
  ));
}

#[tokio::test]
async fn confirm_unknown_cotisation_is_not_found() {
  let s = store().await;
  let err = dues(&s).confirm(Uuid::new_v4(), "TX").await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  for amount in [0, -500] {
    let err = dues(&s)
      .initiate(member.member_id, amount, CotisationKind::Monthly, PaymentMethod::Wave, None)
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "amount", .. }));
  }
}

#[tokio::test]
async fn initiate_for_unknown_member_is_not_found() {
  let s = store().await;
  let err = dues(&s)
    .initiate(Uuid::new_v4(), 100, CotisationKind::Monthly, PaymentMethod::Wave, None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn history_is_newest_first() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let d = dues(&s);
  let mut ids = Vec::new();
  for amount in [100, 200, 300] {
    let c = d
      .initiate(member.member_id, amount, CotisationKind::Monthly, PaymentMethod::Wave, None)
      .await
      .unwrap();
    ids.push(c.cotisation.cotisation_id);
  }

  let history: Vec<_> = d
    .history_for_member(member.member_id)
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.cotisation_id)
    .collect();
  ids.reverse();
  assert_eq!(history, ids);
}

#[tokio::test]
async fn settle_guard_only_matches_pending() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let c = dues(&s)
    .initiate(member.member_id, 100, CotisationKind::Monthly, PaymentMethod::Wave, None)
    .await
    .unwrap()
    .cotisation;

  let first = s
    .settle_cotisation(c.cotisation_id, Settlement::Completed { transaction_ref: "A".into() })
    .await
    .unwrap();
  assert!(matches!(first, Transition::Applied(_)));

  let second = s
    .settle_cotisation(c.cotisation_id, Settlement::Failed { reason: None })
    .await
    .unwrap();
  assert!(matches!(second, Transition::Stale(c) if c.status == CotisationStatus::Completed));
}

// ─── Field reports ───────────────────────────────────────────────────────────

fn kayes_scope() -> GeographicScope {
  GeographicScope {
    region:      "Kayes".into(),
    cercle:      "Kayes".into(),
    commune:     "Kayes".into(),
    bureau_vote: "Bureau 3".into(),
  }
}

#[tokio::test]
async fn submit_list_verify_and_terminality() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let w = FieldReportWorkflow::new(s.clone());

  let results = json!({ "candidatA": 120, "candidatB": 80 });
  let submission = w
    .submit(
      member.member_id,
      "présidentielle",
      kayes_scope(),
      results.as_object().unwrap(),
      None,
    )
    .await
    .unwrap();
  assert_eq!(submission.status, SubmissionStatus::Pending);
  assert_eq!(submission.results["candidatA"], 120);
  assert_eq!(submission.results["candidatB"], 80);

  let pending = w.list_pending().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].result_id, submission.result_id);

  let verified = w.verify(submission.result_id, ReviewDecision::Verified).await.unwrap();
  assert_eq!(verified.status, SubmissionStatus::Verified);
  assert!(verified.reviewed_at.is_some());
  assert!(w.list_pending().await.unwrap().is_empty());

  let err = w
    .verify(submission.result_id, ReviewDecision::Rejected)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    CoreError::InvalidTransition { from: "verified", to: "rejected" }
  ));
  assert_eq!(
    w.get(submission.result_id).await.unwrap().status,
    SubmissionStatus::Verified
  );
}

#[tokio::test]
async fn repeat_verify_fails_even_with_same_decision() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let w = FieldReportWorkflow::new(s.clone());
  let submission = w
    .submit(
      member.member_id,
      "législatives",
      kayes_scope(),
      json!({ "liste1": "45" }).as_object().unwrap(),
      Some("evidence/abc.jpg".into()),
    )
    .await
    .unwrap();
  assert_eq!(submission.evidence_ref.as_deref(), Some("evidence/abc.jpg"));

  w.verify(submission.result_id, ReviewDecision::Rejected).await.unwrap();
  let err = w
    .verify(submission.result_id, ReviewDecision::Rejected)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn submission_requires_scope_and_type() {
  let s = store().await;
  let member = registry(&s)
    .register("acct-1", registration("Fatou Traoré", "Bamako"))
    .await
    .unwrap();
  let w = FieldReportWorkflow::new(s.clone());
  let results = json!({});

  let err = w
    .submit(member.member_id, " ", kayes_scope(), results.as_object().unwrap(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation { field: "election_type", .. }));

  let mut scope = kayes_scope();
  scope.bureau_vote = String::new();
  let err = w
    .submit(member.member_id, "communales", scope, results.as_object().unwrap(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation { field: "bureau_vote", .. }));
}

#[tokio::test]
async fn member_history_only_shows_own_submissions() {
  let s = store().await;
  let r = registry(&s);
  let a = r.register("a", registration("A", "Kayes")).await.unwrap();
  let b = r.register("b", registration("B", "Kayes")).await.unwrap();
  let w = FieldReportWorkflow::new(s.clone());
  let results = json!({ "x": 1 });

  w.submit(a.member_id, "communales", kayes_scope(), results.as_object().unwrap(), None)
    .await
    .unwrap();
  w.submit(b.member_id, "communales", kayes_scope(), results.as_object().unwrap(), None)
    .await
    .unwrap();

  let mine = w.history_for_member(a.member_id).await.unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].member_id, a.member_id);
}

#[tokio::test]
async fn verify_unknown_submission_is_not_found() {
  let s = store().await;
  let err = FieldReportWorkflow::new(s.clone())
    .verify(Uuid::new_v4(), ReviewDecision::Verified)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}
