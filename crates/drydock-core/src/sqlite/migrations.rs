#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "pipeline_checkpoints",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS pipeline_checkpoints (
    checkpoint_key TEXT PRIMARY KEY,
    component_id TEXT NOT NULL,
    updated_at_unix INTEGER NOT NULL
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS pipeline_checkpoints;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "pipeline_checkpoints_updated_at_index",
    up_sql: r#"
CREATE INDEX IF NOT EXISTS idx_pipeline_checkpoints_updated_at
    ON pipeline_checkpoints (updated_at_unix);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_pipeline_checkpoints_updated_at;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
