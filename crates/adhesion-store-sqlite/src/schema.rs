//! SQL schema for the Adhesion SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Named monotonic counters. Incremented with a single upsert statement.
CREATE TABLE IF NOT EXISTS sequences (
    name   TEXT PRIMARY KEY,
    value  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS members (
    member_id            TEXT PRIMARY KEY,
    account_id           TEXT NOT NULL UNIQUE,
    membership_number    TEXT NOT NULL UNIQUE,   -- never updated
    full_name            TEXT NOT NULL,
    national_id          TEXT,
    commune              TEXT NOT NULL,
    profession           TEXT NOT NULL,
    phone                TEXT NOT NULL,
    email                TEXT,
    status               TEXT NOT NULL DEFAULT 'pending'
                         CHECK (status IN ('pending', 'active', 'suspended')),
    role                 TEXT NOT NULL DEFAULT 'militant'
                         CHECK (role IN ('militant', 'collecteur', 'superviseur', 'administrateur')),
    previous_status      TEXT,
    status_reason        TEXT,
    identity_credential  TEXT NOT NULL,
    credential_issued_at TEXT NOT NULL,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- Amounts are integers in the canonical currency (XOF).
CREATE TABLE IF NOT EXISTS cotisations (
    cotisation_id    TEXT PRIMARY KEY,
    member_id        TEXT NOT NULL REFERENCES members(member_id),
    amount           INTEGER NOT NULL CHECK (amount > 0),
    display_currency TEXT,
    display_amount   INTEGER,
    kind             TEXT NOT NULL,   -- 'monthly' | 'annual' | 'one_time'
    payment_method   TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'pending'
                     CHECK (status IN ('pending', 'completed', 'failed')),
    transaction_ref  TEXT,
    paid_at          TEXT,
    failure_reason   TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS election_results (
    result_id     TEXT PRIMARY KEY,
    member_id     TEXT NOT NULL REFERENCES members(member_id),
    election_type TEXT NOT NULL,
    region        TEXT NOT NULL,
    cercle        TEXT NOT NULL,
    commune       TEXT NOT NULL,
    bureau_vote   TEXT NOT NULL,
    results_json  TEXT NOT NULL,   -- candidate -> integer tally
    evidence_ref  TEXT,
    status        TEXT NOT NULL DEFAULT 'pending'
                  CHECK (status IN ('pending', 'verified', 'rejected')),
    submitted_at  TEXT NOT NULL,
    reviewed_at   TEXT
);

CREATE INDEX IF NOT EXISTS members_status_idx       ON members(status);
CREATE INDEX IF NOT EXISTS cotisations_member_idx   ON cotisations(member_id, created_at);
CREATE INDEX IF NOT EXISTS election_results_status_idx ON election_results(status, submitted_at);
CREATE INDEX IF NOT EXISTS election_results_member_idx ON election_results(member_id, submitted_at);

PRAGMA user_version = 1;
";
