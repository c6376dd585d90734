use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered short link.
///
/// `id` is assigned by the registry on creation and is immutable afterwards.
/// A soft-deleted link keeps its record and short code; the code is never
/// recycled.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: i64,
    pub original_url: String,
    pub short_code: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Link {
    /// Build an unsaved link. The registry assigns `id` on insert.
    pub fn new(original_url: impl Into<String>, short_code: impl Into<String>, owner_id: i64) -> Self {
        Link {
            id: 0,
            original_url: original_url.into(),
            short_code: short_code.into(),
            owner_id,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// 文件后端的持久化记录（每行一条 JSON）
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializableLink {
    pub id: i64,
    pub original_url: String,
    pub short_code: String,
    pub owner_id: i64,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl From<&Link> for SerializableLink {
    fn from(link: &Link) -> Self {
        SerializableLink {
            id: link.id,
            original_url: link.original_url.clone(),
            short_code: link.short_code.clone(),
            owner_id: link.owner_id,
            created_at: link.created_at.to_rfc3339(),
            deleted_at: link.deleted_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

impl From<SerializableLink> for Link {
    fn from(record: SerializableLink) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&record.created_at)
            .unwrap_or_else(|_| Utc::now().into())
            .with_timezone(&Utc);

        let deleted_at = record.deleted_at.and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Link {
            id: record.id,
            original_url: record.original_url,
            short_code: record.short_code,
            owner_id: record.owner_id,
            created_at,
            deleted_at,
        }
    }
}

/// Backend capabilities reported by a repository implementation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackendInfo {
    pub backend_type: String,
    pub supports_transactions: bool,
}
