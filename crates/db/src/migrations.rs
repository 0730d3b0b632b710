/// Inline SQL migrations for the docpipe database schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: jobs table
    r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    created_by TEXT NOT NULL,
    input_data TEXT,
    output_data TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    progress INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
    // Migration 2: jobs indexes
    r#"
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC);
"#,
];
