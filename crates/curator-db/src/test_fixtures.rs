//! Test fixtures for database integration tests.
//!
//! The sync engine never creates canonical rows itself (the analysis pipeline
//! does), so tests build them here with plain SQL.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use curator_db::test_fixtures::TestDatabase;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let test_db = TestDatabase::new().await;
//!     let ws = test_db.workspace("/docs", "autotag").await;
//!     let dim = test_db.dimension("topic").await;
//!     let tag = test_db.tag(dim, "invoice").await;
//!     let file = test_db.analyzed_file(ws, "hash-1").await;
//!     test_db.relation(file, tag).await;
//! }
//! ```

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{Database, SyncStatus};

/// In-memory database URL used by tests.
pub const TEST_DATABASE_URL: &str = "sqlite::memory:";

/// Migrated in-memory database with row builders.
pub struct TestDatabase {
    pub db: Database,
}

impl TestDatabase {
    /// Create a fresh, migrated in-memory database.
    pub async fn new() -> Self {
        let db = Database::connect(TEST_DATABASE_URL)
            .await
            .expect("Failed to open in-memory database");
        db.migrate().await.expect("Failed to run migrations");
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub async fn workspace(&self, path: &str, workspace_type: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO workspace_directories (path, workspace_type) VALUES (?1, ?2) RETURNING id",
        )
        .bind(path)
        .bind(workspace_type)
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert workspace")
    }

    /// Insert a pending dimension with empty structured columns.
    pub async fn dimension(&self, name: &str) -> i64 {
        self.dimension_with(name, SyncStatus::Pending, None).await
    }

    pub async fn dimension_with(
        &self,
        name: &str,
        status: SyncStatus,
        trigger_conditions: Option<&str>,
    ) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO file_dimensions
                (name, level, description, is_ai_generated, trigger_conditions,
                 applicable_file_types, context_hints, sync_status, created_at)
            VALUES (?1, 1, ?2, 1, ?3, '["pdf"]', NULL, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(format!("{name} dimension"))
        .bind(trigger_conditions)
        .bind(status.as_i64())
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert dimension")
    }

    /// Insert a pending tag.
    pub async fn tag(&self, dimension_id: i64, name: &str) -> i64 {
        self.tag_with(dimension_id, name, SyncStatus::Pending).await
    }

    pub async fn tag_with(&self, dimension_id: i64, name: &str, status: SyncStatus) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO file_tags (dimension_id, name, sync_status, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(dimension_id)
        .bind(name)
        .bind(status.as_i64())
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert tag")
    }

    /// Insert a pending file that has been analyzed.
    pub async fn analyzed_file(&self, workspace_id: i64, content_hash: &str) -> i64 {
        self.file_with(workspace_id, content_hash, true).await
    }

    pub async fn file_with(&self, workspace_id: i64, content_hash: &str, analyzed: bool) -> i64 {
        let analyzed_at = analyzed.then(Utc::now);
        sqlx::query_scalar(
            r#"
            INSERT INTO files
                (workspace_id, path, content_hash, smart_name, size, language,
                 quality_score, quality_criteria, last_analysis_time, sync_status)
            VALUES (?1, ?2, ?3, ?4, 1024, 'en', 0.8, '{"clarity": 0.9}', ?5, 0)
            RETURNING id
            "#,
        )
        .bind(workspace_id)
        .bind(format!("/files/{content_hash}"))
        .bind(content_hash)
        .bind(format!("{content_hash}.pdf"))
        .bind(analyzed_at)
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert file")
    }

    pub async fn relation(&self, file_id: i64, tag_id: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO file_tag_relations (file_id, tag_id) VALUES (?1, ?2) RETURNING id",
        )
        .bind(file_id)
        .bind(tag_id)
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert relation")
    }

    pub async fn dimension_expansion(&self, name: &str) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO dimension_expansions (name, level, description, reason, created_at)
            VALUES (?1, 1, NULL, 'suggested by analysis', ?2)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert dimension expansion")
    }

    pub async fn tag_expansion(&self, dimension_id: i64, tag_name: &str) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO tag_expansions (dimension_id, tag_name, reason, created_at)
            VALUES (?1, ?2, 'suggested by analysis', ?3)
            RETURNING id
            "#,
        )
        .bind(dimension_id)
        .bind(tag_name)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .expect("Failed to insert tag expansion")
    }

    /// Overwrite a row's status (simulates the pipeline or a cloud pull).
    pub async fn set_status(&self, table: &str, id: i64, status: SyncStatus) {
        sqlx::query(&format!("UPDATE {table} SET sync_status = ?1 WHERE id = ?2"))
            .bind(status.as_i64())
            .bind(id)
            .execute(self.pool())
            .await
            .expect("Failed to update status");
    }

    /// Current status of a row.
    pub async fn status_of(&self, table: &str, id: i64) -> SyncStatus {
        let raw: i64 = sqlx::query_scalar(&format!("SELECT sync_status FROM {table} WHERE id = ?1"))
            .bind(id)
            .fetch_one(self.pool())
            .await
            .expect("Row not found");
        SyncStatus::from_i64(raw).expect("Invalid sync_status")
    }

    /// Delete a row, as the analysis pipeline would.
    pub async fn delete(&self, table: &str, id: i64) {
        sqlx::query(&format!("DELETE FROM {table} WHERE id = ?1"))
            .bind(id)
            .execute(self.pool())
            .await
            .expect("Failed to delete row");
    }

    pub async fn exists(&self, table: &str, id: i64) -> bool {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"))
            .bind(id)
            .fetch_one(self.pool())
            .await
            .expect("Failed to count rows");
        count > 0
    }
}
