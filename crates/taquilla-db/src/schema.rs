//! SQL schema definitions.

/// Complete schema for the v1 cache database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Ledger mirror
-- ============================================================

CREATE TABLE IF NOT EXISTS pots (
    name TEXT PRIMARY KEY,
    balance INTEGER NOT NULL CHECK (balance >= 0),
    color TEXT NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL
);

-- Snapshot of the withdrawal list in display order (position 0 = newest).
CREATE TABLE IF NOT EXISTS withdrawals (
    id_origin TEXT NOT NULL CHECK (id_origin IN ('local', 'remote')),
    id_value TEXT NOT NULL,
    position INTEGER NOT NULL,
    from_pot TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    created_at INTEGER NOT NULL,
    PRIMARY KEY (id_origin, id_value)
);

CREATE INDEX IF NOT EXISTS idx_withdrawals_position ON withdrawals(position);
CREATE INDEX IF NOT EXISTS idx_withdrawals_pot ON withdrawals(from_pot);

CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    key_prefix TEXT NOT NULL,
    key_hash TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1,
    permissions TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    created_by TEXT,
    last_used_at INTEGER
);

-- ============================================================
-- Read-only collections (bets, draws) as JSON snapshots
-- ============================================================

CREATE TABLE IF NOT EXISTS snapshots (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- ============================================================
-- Offline queue: remote writes made while degraded
-- ============================================================

CREATE TABLE IF NOT EXISTS offline_queue (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT
);
"#;
