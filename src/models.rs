//! Records of the two relations the generated SQL may reference.
//!
//! The pipeline itself never reads these structs: it only ever sees a
//! scalar. They exist for the dataset loader and for tests that seed a
//! database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root of the dataset JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub videos: Vec<VideoRecord>,
}

/// A video as it appears in the dataset file, with its snapshots nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(flatten)]
    pub video: Video,
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    #[serde(deserialize_with = "string_or_number")]
    pub creator_id: String,
    pub video_created_at: DateTime<Utc>,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reports_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A snapshot without its owning video id, as nested in the dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reports_count: i64,
    pub delta_views_count: i64,
    pub delta_likes_count: i64,
    pub delta_comments_count: i64,
    pub delta_reports_count: i64,
    /// Measurement time, hourly cadence.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSnapshot {
    pub id: String,
    pub video_id: Uuid,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reports_count: i64,
    pub delta_views_count: i64,
    pub delta_likes_count: i64,
    pub delta_comments_count: i64,
    pub delta_reports_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SnapshotRecord {
    pub fn into_snapshot(self, video_id: Uuid) -> VideoSnapshot {
        VideoSnapshot {
            id: self.id,
            video_id,
            views_count: self.views_count,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            reports_count: self.reports_count,
            delta_views_count: self.delta_views_count,
            delta_likes_count: self.delta_likes_count,
            delta_comments_count: self.delta_comments_count,
            delta_reports_count: self.delta_reports_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// Upstream ids are sometimes numeric.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
