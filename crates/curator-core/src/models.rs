//! Domain models: local rows as the sync engine reads them, and the records
//! sent to and received from the cloud service.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

// =============================================================================
// SYNC STATUS
// =============================================================================

/// Replication state stored in every `sync_status` column.
///
/// The integer `1` is reserved and never written by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
}

impl SyncStatus {
    /// Column value for this status.
    pub const fn as_i64(self) -> i64 {
        match self {
            SyncStatus::Pending => 0,
            SyncStatus::Synced => 2,
        }
    }

    /// Decode a column value; unknown values are rejected.
    pub fn from_i64(value: i64) -> Result<Self> {
        match value {
            0 => Ok(SyncStatus::Pending),
            2 => Ok(SyncStatus::Synced),
            other => Err(Error::Serialization(format!(
                "unknown sync_status value {other}"
            ))),
        }
    }
}

// =============================================================================
// CLOUD IDENTIFIERS
// =============================================================================

/// Identifier assigned by the cloud database.
///
/// Never stored locally; resolved by name through the identifier cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudId(pub i64);

impl fmt::Display for CloudId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a JSON text column for transmission. Empty columns become `null`.
pub fn parse_json_column(column: &str, raw: Option<&str>) -> Result<JsonValue> {
    match raw.map(str::trim) {
        None | Some("") => Ok(JsonValue::Null),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| Error::Serialization(format!("malformed JSON in column {column}: {e}"))),
    }
}

// =============================================================================
// LOCAL ROWS
// =============================================================================

/// A classification axis (`file_dimensions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: i64,
    pub name: String,
    pub level: i64,
    pub description: Option<String>,
    pub is_ai_generated: bool,
    /// JSON text as stored.
    pub trigger_conditions: Option<String>,
    /// JSON text as stored.
    pub applicable_file_types: Option<String>,
    /// JSON text as stored.
    pub context_hints: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl Dimension {
    /// Build the cloud record, parsing the structured columns.
    pub fn to_cloud(&self) -> Result<CloudDimension> {
        Ok(CloudDimension {
            name: self.name.clone(),
            level: self.level,
            description: self.description.clone(),
            is_ai_generated: self.is_ai_generated,
            trigger_conditions: parse_json_column(
                "trigger_conditions",
                self.trigger_conditions.as_deref(),
            )?,
            applicable_file_types: parse_json_column(
                "applicable_file_types",
                self.applicable_file_types.as_deref(),
            )?,
            context_hints: parse_json_column("context_hints", self.context_hints.as_deref())?,
            created_at: self.created_at,
        })
    }
}

/// A tag row joined with its owning dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    pub dimension: Dimension,
}

/// An analyzed file (`files`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub path: String,
    pub content_hash: String,
    pub smart_name: Option<String>,
    pub size: Option<i64>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub quality_score: Option<f64>,
    pub quality_confidence: Option<f64>,
    /// JSON text as stored.
    pub quality_criteria: Option<String>,
    pub quality_reasoning: Option<String>,
    pub grouping_reason: Option<String>,
    pub grouping_confidence: Option<f64>,
    pub multimodal_content: Option<String>,
    pub last_analysis_time: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}

impl FileRecord {
    /// Build the cloud record keyed by content hash.
    pub fn to_cloud(&self) -> Result<CloudFile> {
        Ok(CloudFile {
            file_hash: self.content_hash.clone(),
            smart_name: self.smart_name.clone(),
            size: self.size,
            author: self.author.clone(),
            description: self.description.clone(),
            content: self.content.clone(),
            language: self.language.clone(),
            quality_score: self.quality_score,
            quality_confidence: self.quality_confidence,
            quality_criteria: parse_json_column(
                "quality_criteria",
                self.quality_criteria.as_deref(),
            )?,
            quality_reasoning: self.quality_reasoning.clone(),
            grouping_reason: self.grouping_reason.clone(),
            grouping_confidence: self.grouping_confidence,
            multimodal_content: self.multimodal_content.clone(),
            last_analysis_time: self.last_analysis_time,
        })
    }
}

/// A file ↔ tag assignment with the names needed for cloud remapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTagRelation {
    pub id: i64,
    pub file_id: i64,
    pub file_hash: String,
    pub tag_id: i64,
    pub tag_name: String,
    pub dimension_name: String,
}

/// A locally generated dimension proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionExpansion {
    pub id: i64,
    pub name: String,
    pub level: i64,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DimensionExpansion {
    pub fn to_cloud(&self) -> CloudDimensionExpansion {
        CloudDimensionExpansion {
            name: self.name.clone(),
            level: self.level,
            description: self.description.clone(),
            reason: self.reason.clone(),
            created_at: self.created_at,
        }
    }
}

/// A locally generated tag proposal, joined to its dimension's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagExpansion {
    pub id: i64,
    /// Local dimension id.
    pub dimension_id: i64,
    /// `None` when the referenced dimension row no longer exists.
    pub dimension_name: Option<String>,
    pub tag_name: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Rows still waiting for upload, per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCounts {
    pub files: i64,
    pub tags: i64,
    pub relations: i64,
    pub dimension_expansions: i64,
    pub tag_expansions: i64,
}

impl PendingCounts {
    pub fn total(&self) -> i64 {
        self.files + self.tags + self.relations + self.dimension_expansions + self.tag_expansions
    }
}

// =============================================================================
// CLOUD RECORDS
// =============================================================================

/// Dimension as listed by the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDimension {
    pub id: CloudId,
    pub name: String,
}

/// Tag as listed by the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: CloudId,
    pub name: String,
    pub dimension_id: CloudId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDimension {
    pub name: String,
    pub level: i64,
    pub description: Option<String>,
    pub is_ai_generated: bool,
    pub trigger_conditions: JsonValue,
    pub applicable_file_types: JsonValue,
    pub context_hints: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudTag {
    pub name: String,
    pub dimension_id: CloudId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudFile {
    /// Content hash; the cloud primary key.
    pub file_hash: String,
    pub smart_name: Option<String>,
    pub size: Option<i64>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub quality_score: Option<f64>,
    pub quality_confidence: Option<f64>,
    pub quality_criteria: JsonValue,
    pub quality_reasoning: Option<String>,
    pub grouping_reason: Option<String>,
    pub grouping_confidence: Option<f64>,
    pub multimodal_content: Option<String>,
    pub last_analysis_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloudTagRelation {
    pub file_hash: String,
    pub tag_id: CloudId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDimensionExpansion {
    pub name: String,
    pub level: i64,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudTagExpansion {
    /// Cloud dimension id, or the local id when the name could not be resolved.
    pub dimension_id: i64,
    pub tag_name: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of one `batch_sync` call. Absent sections are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<CloudDimension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<CloudTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<CloudFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_relations: Option<Vec<CloudTagRelation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_expansions: Option<Vec<CloudDimensionExpansion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_expansions: Option<Vec<CloudTagExpansion>>,
}

impl SyncPayload {
    pub fn dimensions(dimensions: Vec<CloudDimension>) -> Self {
        Self {
            dimensions: Some(dimensions),
            ..Default::default()
        }
    }

    pub fn tags(tags: Vec<CloudTag>) -> Self {
        Self {
            tags: Some(tags),
            ..Default::default()
        }
    }

    pub fn files_and_relations(
        files: Vec<CloudFile>,
        tag_relations: Vec<CloudTagRelation>,
    ) -> Self {
        Self {
            files: Some(files),
            tag_relations: Some(tag_relations),
            ..Default::default()
        }
    }

    pub fn expansions(
        dimension_expansions: Vec<CloudDimensionExpansion>,
        tag_expansions: Vec<CloudTagExpansion>,
    ) -> Self {
        Self {
            dimension_expansions: Some(dimension_expansions),
            tag_expansions: Some(tag_expansions),
            ..Default::default()
        }
    }

    /// Total number of records across all included sections.
    pub fn record_count(&self) -> usize {
        self.dimensions.as_ref().map_or(0, Vec::len)
            + self.tags.as_ref().map_or(0, Vec::len)
            + self.files.as_ref().map_or(0, Vec::len)
            + self.tag_relations.as_ref().map_or(0, Vec::len)
            + self.dimension_expansions.as_ref().map_or(0, Vec::len)
            + self.tag_expansions.as_ref().map_or(0, Vec::len)
    }
}
