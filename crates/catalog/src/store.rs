//! File catalog trait and SQLite implementation.

use crate::error::{CatalogError, CatalogResult};
use crate::repos::RevisionRepo;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

/// Schema version recorded in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// Combined file catalog trait.
#[async_trait]
pub trait FileCatalog: RevisionRepo + Send + Sync {
    /// Bucket this catalog is scoped to.
    fn bucket(&self) -> &str;

    /// Name of the backing implementation, for logging.
    fn backend_name(&self) -> &'static str;

    /// Check catalog connectivity and health.
    async fn health_check(&self) -> CatalogResult<()>;
}

/// SQLite-backed file catalog.
///
/// Several buckets may share one database file; every row carries its
/// bucket name and every query is scoped by it.
pub struct SqliteCatalog {
    pool: Pool<Sqlite>,
    bucket: String,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog database at `path`.
    pub async fn new(
        path: impl AsRef<Path>,
        bucket: impl Into<String>,
        busy_timeout: Duration,
    ) -> CatalogResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            // One connection serialises writers, so revision numbering never races.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let catalog = Self {
            pool,
            bucket: bucket.into(),
        };
        catalog.migrate().await?;
        tracing::debug!(path = %path.display(), bucket = %catalog.bucket, "opened sqlite catalog");
        Ok(catalog)
    }

    /// Create the schema, refusing databases written by a newer version.
    pub async fn migrate(&self) -> CatalogResult<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        if version > SCHEMA_VERSION {
            return Err(CatalogError::Config(format!(
                "catalog schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileCatalog for SqliteCatalog {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::RevisionRow;
    use crate::repos::revisions::matches_prefix;
    use chunkvault_core::{FileId, FileRevision, NewRevision};
    use uuid::Uuid;

    fn map_insert_error(id: FileId) -> impl FnOnce(sqlx::Error) -> CatalogError {
        move |e| match e {
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint") => {
                CatalogError::AlreadyExists(format!("file_id {id} already catalogued"))
            }
            other => other.into(),
        }
    }

    fn rows_into_revisions(rows: Vec<RevisionRow>) -> CatalogResult<Vec<FileRevision>> {
        rows.into_iter().map(RevisionRow::into_revision).collect()
    }

    #[async_trait]
    impl RevisionRepo for SqliteCatalog {
        async fn insert(&self, revision: NewRevision) -> CatalogResult<FileRevision> {
            let id = revision.id;
            let mut tx = self.pool.begin().await?;

            let current: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(revision) FROM file_revisions WHERE bucket = ? AND filename = ?",
            )
            .bind(&self.bucket)
            .bind(&revision.filename)
            .fetch_one(&mut *tx)
            .await?;
            let next = current.map_or(0, |n| n + 1);

            let committed = revision.into_revision(next as u64);
            let row = RevisionRow::from_revision(&self.bucket, &committed)?;

            sqlx::query(
                r#"
                INSERT INTO file_revisions (
                    file_id, bucket, filename, revision, length, chunk_size,
                    checksum_algorithm, checksum, uploaded_at, metadata
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.file_id)
            .bind(&row.bucket)
            .bind(&row.filename)
            .bind(row.revision)
            .bind(row.length)
            .bind(row.chunk_size)
            .bind(&row.checksum_algorithm)
            .bind(&row.checksum)
            .bind(row.uploaded_at)
            .bind(&row.metadata)
            .execute(&mut *tx)
            .await
            .map_err(map_insert_error(id))?;

            tx.commit().await?;
            Ok(committed)
        }

        async fn find_latest(&self, filename: &str) -> CatalogResult<Option<FileRevision>> {
            let row = sqlx::query_as::<_, RevisionRow>(
                r#"
                SELECT * FROM file_revisions
                WHERE bucket = ? AND filename = ?
                ORDER BY revision DESC, uploaded_at DESC
                LIMIT 1
                "#,
            )
            .bind(&self.bucket)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;
            row.map(RevisionRow::into_revision).transpose()
        }

        async fn find_revision(
            &self,
            filename: &str,
            revision: u64,
        ) -> CatalogResult<Option<FileRevision>> {
            let Ok(revision) = i64::try_from(revision) else {
                return Ok(None);
            };
            let row = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM file_revisions WHERE bucket = ? AND filename = ? AND revision = ?",
            )
            .bind(&self.bucket)
            .bind(filename)
            .bind(revision)
            .fetch_optional(&self.pool)
            .await?;
            row.map(RevisionRow::into_revision).transpose()
        }

        async fn find_by_id(&self, id: FileId) -> CatalogResult<Option<FileRevision>> {
            let row = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM file_revisions WHERE bucket = ? AND file_id = ?",
            )
            .bind(&self.bucket)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
            row.map(RevisionRow::into_revision).transpose()
        }

        async fn remove(&self, id: FileId) -> CatalogResult<()> {
            let result = sqlx::query("DELETE FROM file_revisions WHERE bucket = ? AND file_id = ?")
                .bind(&self.bucket)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(CatalogError::NotFound(format!("file_id {id} not found")));
            }
            Ok(())
        }

        async fn rename(&self, id: FileId, new_filename: &str) -> CatalogResult<FileRevision> {
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM file_revisions WHERE bucket = ? AND file_id = ?",
            )
            .bind(&self.bucket)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("file_id {id} not found")))?;

            if row.filename == new_filename {
                tx.commit().await?;
                return row.into_revision();
            }

            let current: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(revision) FROM file_revisions WHERE bucket = ? AND filename = ?",
            )
            .bind(&self.bucket)
            .bind(new_filename)
            .fetch_one(&mut *tx)
            .await?;
            let next = current.map_or(0, |n| n + 1);

            sqlx::query(
                "UPDATE file_revisions SET filename = ?, revision = ? WHERE bucket = ? AND file_id = ?",
            )
            .bind(new_filename)
            .bind(next)
            .bind(&self.bucket)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            RevisionRow {
                filename: new_filename.to_string(),
                revision: next,
                ..row
            }
            .into_revision()
        }

        async fn list_filenames(&self, prefix: Option<&str>) -> CatalogResult<Vec<String>> {
            let names: Vec<String> = sqlx::query_scalar(
                "SELECT DISTINCT filename FROM file_revisions WHERE bucket = ? ORDER BY filename",
            )
            .bind(&self.bucket)
            .fetch_all(&self.pool)
            .await?;

            Ok(match prefix {
                Some(prefix) => names
                    .into_iter()
                    .filter(|name| matches_prefix(name, prefix))
                    .collect(),
                None => names,
            })
        }

        async fn list_revisions(&self, filename: &str) -> CatalogResult<Vec<FileRevision>> {
            let rows = sqlx::query_as::<_, RevisionRow>(
                "SELECT * FROM file_revisions WHERE bucket = ? AND filename = ? ORDER BY revision",
            )
            .bind(&self.bucket)
            .bind(filename)
            .fetch_all(&self.pool)
            .await?;
            rows_into_revisions(rows)
        }

        async fn list_ids(&self) -> CatalogResult<Vec<FileId>> {
            let ids: Vec<Uuid> =
                sqlx::query_scalar("SELECT file_id FROM file_revisions WHERE bucket = ?")
                    .bind(&self.bucket)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(ids.into_iter().map(FileId::from_uuid).collect())
        }

        async fn clear(&self) -> CatalogResult<u64> {
            let result = sqlx::query("DELETE FROM file_revisions WHERE bucket = ?")
                .bind(&self.bucket)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- One row per committed file revision
CREATE TABLE IF NOT EXISTS file_revisions (
    file_id BLOB PRIMARY KEY,
    bucket TEXT NOT NULL,
    filename TEXT NOT NULL,
    revision INTEGER NOT NULL,
    length INTEGER NOT NULL,
    chunk_size INTEGER NOT NULL,
    checksum_algorithm TEXT NOT NULL,
    checksum TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,
    metadata TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_file_revisions_name
    ON file_revisions(bucket, filename, revision);
CREATE INDEX IF NOT EXISTS idx_file_revisions_id
    ON file_revisions(bucket, file_id);
"#;
