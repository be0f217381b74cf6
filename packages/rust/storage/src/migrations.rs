//! SQL migration definitions for the toolscout database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: raw_tools, enriched_tools",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Raw tool records awaiting enrichment.
-- status: 0 = pending, 1 = processed, -1 = failed
CREATE TABLE IF NOT EXISTS raw_tools (
    id            TEXT PRIMARY KEY,
    fields_json   TEXT NOT NULL,
    status        INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    error_at      TEXT,
    processed_at  TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_raw_tools_status ON raw_tools(status);

-- Enriched tool profiles (append-only from the pipeline)
CREATE TABLE IF NOT EXISTS enriched_tools (
    id                TEXT PRIMARY KEY,
    original_id       TEXT NOT NULL,
    slug              TEXT NOT NULL,
    name              TEXT NOT NULL,
    website           TEXT NOT NULL,
    tagline           TEXT NOT NULL,
    short_description TEXT NOT NULL,
    company           TEXT NOT NULL,
    description       TEXT NOT NULL,
    categories_json   TEXT NOT NULL,
    features_json     TEXT NOT NULL,
    integrations_json TEXT NOT NULL,
    pros_cons_json    TEXT NOT NULL,
    use_cases_json    TEXT NOT NULL,
    logo              TEXT,
    processed_at      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_enriched_tools_slug ON enriched_tools(slug);
CREATE INDEX IF NOT EXISTS idx_enriched_tools_original ON enriched_tools(original_id);
CREATE INDEX IF NOT EXISTS idx_enriched_tools_processed_at ON enriched_tools(processed_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
