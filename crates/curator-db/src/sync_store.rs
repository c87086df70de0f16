//! SQLite implementation of the sync engine's local store.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

use curator_core::{
    Dimension, DimensionExpansion, Error, FileRecord, FileTagRelation, PendingCounts, Result,
    SyncStatus, SyncStore, TagExpansion, TagRecord,
};

const PENDING: i64 = SyncStatus::Pending.as_i64();
const SYNCED: i64 = SyncStatus::Synced.as_i64();

/// Tag columns joined with the owning dimension, aliased `d_*`.
const TAG_SELECT: &str = r#"
    SELECT
        t.id, t.name, t.created_at, t.sync_status,
        d.id AS d_id, d.name AS d_name, d.level AS d_level,
        d.description AS d_description, d.is_ai_generated AS d_is_ai_generated,
        d.trigger_conditions AS d_trigger_conditions,
        d.applicable_file_types AS d_applicable_file_types,
        d.context_hints AS d_context_hints,
        d.created_at AS d_created_at, d.sync_status AS d_sync_status
    FROM file_tags t
    JOIN file_dimensions d ON d.id = t.dimension_id
"#;

const RELATION_SELECT: &str = r#"
    SELECT
        r.id, r.file_id, f.content_hash, r.tag_id,
        t.name AS tag_name, d.name AS dimension_name
    FROM file_tag_relations r
    JOIN files f ON f.id = r.file_id
    JOIN file_tags t ON t.id = r.tag_id
    JOIN file_dimensions d ON d.id = t.dimension_id
"#;

/// Tables whose rows the engine moves to `synced`.
#[derive(Debug, Clone, Copy)]
enum SyncedTable {
    Tags,
    Files,
    Relations,
    DimensionExpansions,
    TagExpansions,
}

impl SyncedTable {
    fn as_str(self) -> &'static str {
        match self {
            SyncedTable::Tags => "file_tags",
            SyncedTable::Files => "files",
            SyncedTable::Relations => "file_tag_relations",
            SyncedTable::DimensionExpansions => "dimension_expansions",
            SyncedTable::TagExpansions => "tag_expansions",
        }
    }
}

/// Encode ids as a JSON array for `IN (SELECT value FROM json_each(?))`.
fn id_array(ids: &[i64]) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

/// SQLite implementation of [`SyncStore`].
#[derive(Clone)]
pub struct SqliteSyncStore {
    pool: Pool<Sqlite>,
}

impl SqliteSyncStore {
    /// Create a new SqliteSyncStore with the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn parse_tag_row(row: &SqliteRow) -> Result<TagRecord> {
        Ok(TagRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            sync_status: SyncStatus::from_i64(row.try_get("sync_status")?)?,
            dimension: Dimension {
                id: row.try_get("d_id")?,
                name: row.try_get("d_name")?,
                level: row.try_get("d_level")?,
                description: row.try_get("d_description")?,
                is_ai_generated: row.try_get("d_is_ai_generated")?,
                trigger_conditions: row.try_get("d_trigger_conditions")?,
                applicable_file_types: row.try_get("d_applicable_file_types")?,
                context_hints: row.try_get("d_context_hints")?,
                created_at: row.try_get("d_created_at")?,
                sync_status: SyncStatus::from_i64(row.try_get("d_sync_status")?)?,
            },
        })
    }

    fn parse_file_row(row: &SqliteRow) -> Result<FileRecord> {
        Ok(FileRecord {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            path: row.try_get("path")?,
            content_hash: row.try_get("content_hash")?,
            smart_name: row.try_get("smart_name")?,
            size: row.try_get("size")?,
            author: row.try_get("author")?,
            description: row.try_get("description")?,
            content: row.try_get("content")?,
            language: row.try_get("language")?,
            quality_score: row.try_get("quality_score")?,
            quality_confidence: row.try_get("quality_confidence")?,
            quality_criteria: row.try_get("quality_criteria")?,
            quality_reasoning: row.try_get("quality_reasoning")?,
            grouping_reason: row.try_get("grouping_reason")?,
            grouping_confidence: row.try_get("grouping_confidence")?,
            multimodal_content: row.try_get("multimodal_content")?,
            last_analysis_time: row.try_get("last_analysis_time")?,
            sync_status: SyncStatus::from_i64(row.try_get("sync_status")?)?,
        })
    }

    fn parse_relation_row(row: &SqliteRow) -> Result<FileTagRelation> {
        Ok(FileTagRelation {
            id: row.try_get("id")?,
            file_id: row.try_get("file_id")?,
            file_hash: row.try_get("content_hash")?,
            tag_id: row.try_get("tag_id")?,
            tag_name: row.try_get("tag_name")?,
            dimension_name: row.try_get("dimension_name")?,
        })
    }

    async fn mark_synced(&self, table: SyncedTable, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        mark_synced_on(&mut *conn, table, ids).await
    }
}

async fn mark_synced_on(
    conn: &mut SqliteConnection,
    table: SyncedTable,
    ids: &[i64],
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "UPDATE {} SET sync_status = ?1 WHERE id IN (SELECT value FROM json_each(?2))",
        table.as_str()
    );
    let result = sqlx::query(&sql)
        .bind(SYNCED)
        .bind(id_array(ids)?)
        .execute(conn)
        .await
        .map_err(Error::Database)?;

    debug!(
        subsystem = "db",
        component = "sync_store",
        op = "mark_synced",
        db_table = table.as_str(),
        rows = result.rows_affected(),
        "Marked rows synced"
    );
    Ok(result.rows_affected())
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn pending_files(&self, workspace_type: &str, limit: i64) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT f.*
            FROM files f
            JOIN workspace_directories w ON w.id = f.workspace_id
            WHERE f.sync_status = ?1
              AND f.last_analysis_time IS NOT NULL
              AND w.workspace_type = ?2
            ORDER BY f.id
            LIMIT ?3
            "#,
        )
        .bind(PENDING)
        .bind(workspace_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_file_row).collect()
    }

    async fn tags_for_files(&self, file_ids: &[i64]) -> Result<Vec<TagRecord>> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{TAG_SELECT}
             WHERE t.id IN (
                 SELECT DISTINCT r.tag_id FROM file_tag_relations r
                 WHERE r.file_id IN (SELECT value FROM json_each(?1))
             )
             ORDER BY t.id"
        );
        let rows = sqlx::query(&sql)
            .bind(id_array(file_ids)?)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(Self::parse_tag_row).collect()
    }

    async fn pending_tags(&self, limit: i64) -> Result<Vec<TagRecord>> {
        let sql = format!("{TAG_SELECT} WHERE t.sync_status = ?1 ORDER BY t.id LIMIT ?2");
        let rows = sqlx::query(&sql)
            .bind(PENDING)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(Self::parse_tag_row).collect()
    }

    async fn relations_for_files(&self, file_ids: &[i64]) -> Result<Vec<FileTagRelation>> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{RELATION_SELECT}
             WHERE r.file_id IN (SELECT value FROM json_each(?1))
             ORDER BY r.id"
        );
        let rows = sqlx::query(&sql)
            .bind(id_array(file_ids)?)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(Self::parse_relation_row).collect()
    }

    async fn pending_relations_of_synced_files(
        &self,
        limit: i64,
    ) -> Result<Vec<FileTagRelation>> {
        let sql = format!(
            "{RELATION_SELECT}
             WHERE r.sync_status = ?1 AND f.sync_status = ?2
             ORDER BY r.id
             LIMIT ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(PENDING)
            .bind(SYNCED)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(Self::parse_relation_row).collect()
    }

    async fn pending_dimension_expansions(&self, limit: i64) -> Result<Vec<DimensionExpansion>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, level, description, reason, created_at
            FROM dimension_expansions
            WHERE sync_status = ?1
            ORDER BY id
            LIMIT ?2
            "#,
        )
        .bind(PENDING)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(DimensionExpansion {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    level: row.try_get("level")?,
                    description: row.try_get("description")?,
                    reason: row.try_get("reason")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn pending_tag_expansions(&self, limit: i64) -> Result<Vec<TagExpansion>> {
        let rows = sqlx::query(
            r#"
            SELECT te.id, te.dimension_id, d.name AS dimension_name,
                   te.tag_name, te.reason, te.created_at
            FROM tag_expansions te
            LEFT JOIN file_dimensions d ON d.id = te.dimension_id
            WHERE te.sync_status = ?1
            ORDER BY te.id
            LIMIT ?2
            "#,
        )
        .bind(PENDING)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(TagExpansion {
                    id: row.try_get("id")?,
                    dimension_id: row.try_get("dimension_id")?,
                    dimension_name: row.try_get("dimension_name")?,
                    tag_name: row.try_get("tag_name")?,
                    reason: row.try_get("reason")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn mark_tags_synced(&self, ids: &[i64]) -> Result<u64> {
        self.mark_synced(SyncedTable::Tags, ids).await
    }

    async fn mark_files_and_relations_synced(
        &self,
        file_ids: &[i64],
        relation_ids: &[i64],
    ) -> Result<(u64, u64)> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let files = mark_synced_on(&mut *tx, SyncedTable::Files, file_ids).await?;
        let relations = mark_synced_on(&mut *tx, SyncedTable::Relations, relation_ids).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok((files, relations))
    }

    async fn mark_dimension_expansions_synced(&self, ids: &[i64]) -> Result<u64> {
        self.mark_synced(SyncedTable::DimensionExpansions, ids).await
    }

    async fn mark_tag_expansions_synced(&self, ids: &[i64]) -> Result<u64> {
        self.mark_synced(SyncedTable::TagExpansions, ids).await
    }

    async fn delete_accepted_expansions(&self) -> Result<(u64, u64)> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let dimensions = sqlx::query(
            r#"
            DELETE FROM dimension_expansions
            WHERE name IN (SELECT name FROM file_dimensions WHERE sync_status = ?1)
            "#,
        )
        .bind(SYNCED)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let tags = sqlx::query(
            r#"
            DELETE FROM tag_expansions
            WHERE id IN (
                SELECT te.id
                FROM tag_expansions te
                JOIN file_dimensions proposed ON proposed.id = te.dimension_id
                JOIN file_tags t ON t.name = te.tag_name AND t.sync_status = ?1
                JOIN file_dimensions owner ON owner.id = t.dimension_id
                WHERE owner.name = proposed.name
            )
            "#,
        )
        .bind(SYNCED)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        tx.commit().await.map_err(Error::Database)?;
        Ok((dimensions, tags))
    }

    async fn pending_counts(&self, workspace_type: &str) -> Result<PendingCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM files f
                   JOIN workspace_directories w ON w.id = f.workspace_id
                  WHERE f.sync_status = ?1
                    AND f.last_analysis_time IS NOT NULL
                    AND w.workspace_type = ?2) AS files,
                (SELECT COUNT(*) FROM file_tags WHERE sync_status = ?1) AS tags,
                (SELECT COUNT(*) FROM file_tag_relations WHERE sync_status = ?1) AS relations,
                (SELECT COUNT(*) FROM dimension_expansions WHERE sync_status = ?1)
                    AS dimension_expansions,
                (SELECT COUNT(*) FROM tag_expansions WHERE sync_status = ?1) AS tag_expansions
            "#,
        )
        .bind(PENDING)
        .bind(workspace_type)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(PendingCounts {
            files: row.try_get("files")?,
            tags: row.try_get("tags")?,
            relations: row.try_get("relations")?,
            dimension_expansions: row.try_get("dimension_expansions")?,
            tag_expansions: row.try_get("tag_expansions")?,
        })
    }
}
