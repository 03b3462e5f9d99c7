//! SQL migration definitions for the curator state database.
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
            description: "Initial schema: seen_urls, embeddings",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS seen_urls (
    url        TEXT PRIMARY KEY,
    first_seen INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_seen_urls_first_seen ON seen_urls(first_seen);

CREATE TABLE IF NOT EXISTS embeddings (
    id           TEXT PRIMARY KEY,
    vector_json  TEXT NOT NULL,
    title        TEXT NOT NULL DEFAULT '',
    timestamp_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_embeddings_timestamp ON embeddings(timestamp_ms);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Feedback history and learned weights",
            sql: r#"
CREATE TABLE IF NOT EXISTS feedback_records (
    id           TEXT PRIMARY KEY,
    timestamp_ms INTEGER NOT NULL,
    actor_id     TEXT NOT NULL,
    action       TEXT NOT NULL,
    tags_json    TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_feedback_timestamp ON feedback_records(timestamp_ms);

-- Single-row table; id is always 1
CREATE TABLE IF NOT EXISTS learned_weights (
    id                    INTEGER PRIMARY KEY CHECK (id = 1),
    version               INTEGER NOT NULL,
    updated_at            INTEGER,
    category_boosts_json  TEXT NOT NULL DEFAULT '{}',
    source_boosts_json    TEXT NOT NULL DEFAULT '{}'
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_ascend_without_gaps() {
        let versions: Vec<u32> = all_migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        for m in all_migrations() {
            assert!(m.sql.contains(&format!("VALUES ({})", m.version)));
        }
    }
}
