//! Database Migrations
//!
//! Manages the SQLite schema for the poll store.
//! Migrations are compiled into the binary, applied sequentially inside a
//! transaction each, and tracked in a migrations table with a checksum.

use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;

/// Migration error types
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid migration name: {0}")]
    InvalidName(String),

    #[error("Migration {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("Migration {name} was modified after being applied")]
    ChecksumMismatch { name: String },
}

/// Migrations shipped with the binary, in order.
/// File names follow `YYYYMMDDHHMMSS_description.sql`.
const EMBEDDED: &[(&str, &str)] = &[(
    "20240601000000_create_polls.sql",
    include_str!("../../migrations/20240601000000_create_polls.sql"),
)];

/// A single migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version (timestamp-based)
    pub version: i64,
    /// Migration name/description
    pub name: String,
    /// SQL statements to apply
    pub sql: String,
}

/// Applied/pending state of one migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    pub applied: bool,
}

/// Migration runner
#[derive(Debug)]
pub struct MigrationRunner {
    pool: SqlitePool,
    /// Applied migrations table name
    table_name: String,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: "quickpoll_migrations".to_string(),
        }
    }

    /// All embedded migrations, sorted by version
    pub fn migrations() -> Result<Vec<Migration>, MigrationError> {
        let mut migrations = EMBEDDED
            .iter()
            .map(|(file, sql)| {
                let (version, name) = parse_migration_filename(Path::new(file))?;
                Ok(Migration {
                    version,
                    name,
                    sql: sql.to_string(),
                })
            })
            .collect::<Result<Vec<_>, MigrationError>>()?;
        migrations.sort_by_key(|m| m.version);
        Ok(migrations)
    }

    /// Initialize the migrations table
    async fn init_table(&self) -> Result<(), MigrationError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                checksum TEXT NOT NULL
            )
            "#,
            self.table_name
        );

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    /// Applied migrations as (version, checksum)
    async fn get_applied_migrations(&self) -> Result<Vec<(i64, String)>, MigrationError> {
        let query = format!(
            "SELECT version, checksum FROM {} ORDER BY version ASC",
            self.table_name
        );

        let applied: Vec<(i64, String)> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(applied)
    }

    /// Run all pending migrations, returning the ones applied by this call
    pub async fn run_migrations(&self) -> Result<Vec<Migration>, MigrationError> {
        self.init_table().await?;
        let applied = self.get_applied_migrations().await?;

        let mut applied_now = Vec::new();

        for migration in Self::migrations()? {
            let checksum = calculate_checksum(&migration.sql);

            if let Some((_, recorded)) = applied.iter().find(|(v, _)| *v == migration.version) {
                if *recorded != checksum {
                    return Err(MigrationError::ChecksumMismatch {
                        name: migration.name,
                    });
                }
                tracing::debug!("Migration {} already applied, skipping", migration.name);
                continue;
            }

            let mut tx = self.pool.begin().await?;

            for statement in migration.sql.split(';') {
                let trimmed = statement.trim();
                if trimmed.is_empty() {
                    continue;
                }
                sqlx::query(trimmed)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| MigrationError::Failed {
                        name: migration.name.clone(),
                        message: e.to_string(),
                    })?;
            }

            let insert_query = format!(
                "INSERT INTO {} (version, name, applied_at, checksum) VALUES (?1, ?2, ?3, ?4)",
                self.table_name
            );
            sqlx::query(&insert_query)
                .bind(migration.version)
                .bind(&migration.name)
                .bind(chrono::Utc::now().to_rfc3339())
                .bind(&checksum)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!("Applied migration: {}", migration.name);
            applied_now.push(migration);
        }

        if applied_now.is_empty() {
            tracing::info!("No pending migrations");
        } else {
            tracing::info!("Applied {} migration(s)", applied_now.len());
        }

        Ok(applied_now)
    }

    /// Applied/pending state of every embedded migration
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        self.init_table().await?;
        let applied = self.get_applied_migrations().await?;

        Ok(Self::migrations()?
            .into_iter()
            .map(|m| MigrationStatus {
                applied: applied.iter().any(|(v, _)| *v == m.version),
                version: m.version,
                name: m.name,
            })
            .collect())
    }
}

/// Parse migration filename to extract version and name
/// Format: YYYYMMDDHHMMSS_description.sql
fn parse_migration_filename(filename: &Path) -> Result<(i64, String), MigrationError> {
    let stem = filename
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MigrationError::InvalidName(filename.display().to_string()))?;

    let (version, name) = stem.split_once('_').ok_or_else(|| {
        MigrationError::InvalidName(format!(
            "{} (expected: YYYYMMDDHHMMSS_description.sql)",
            filename.display()
        ))
    })?;

    let version: i64 = version
        .parse()
        .map_err(|_| MigrationError::InvalidName(format!("Invalid version in: {}", filename.display())))?;

    Ok((version, name.to_string()))
}

/// Calculate checksum for migration content
fn calculate_checksum(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
