//! Link registry storage contract and backend selection.

use std::sync::Arc;

use tracing::error;

use crate::config::get_config;
use crate::errors::{LinkvaultError, Result};
use crate::structs::{BackendInfo, Link};

pub mod backends;
pub mod tx;

/// Outcome of [`Repository::create`].
///
/// The two collision causes are deliberately asymmetric: a short-code
/// collision surfaces as [`LinkvaultError::CodeConflict`] (the caller must
/// regenerate and retry), while a content collision is not an insert failure
/// at all — the existing record is handed back so the caller can return it.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// Inserted; the link now carries its registry-assigned id.
    Created(Link),
    /// A non-deleted link with the same `(original_url, owner_id)` already
    /// exists; nothing was inserted.
    DuplicateUrl(Link),
}

impl CreateOutcome {
    pub fn link(&self) -> &Link {
        match self {
            CreateOutcome::Created(link) => link,
            CreateOutcome::DuplicateUrl(link) => link,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CreateOutcome::DuplicateUrl(_))
    }
}

#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Insert a new link.
    ///
    /// Short-code collisions return `Err(CodeConflict)` without mutating
    /// state. Content collisions return `Ok(DuplicateUrl(existing))`.
    async fn create(&self, link: Link) -> Result<CreateOutcome>;

    /// Look up a link by code. Soft-deleted links ARE returned; callers
    /// inspect `deleted_at` to distinguish gone from missing.
    async fn get_by_code(&self, code: &str) -> Result<Link>;

    /// Pre-flight existence check on `(owner_id, original_url)` among
    /// non-deleted links.
    async fn get_by_owner_and_url(&self, owner_id: i64, url: &str) -> Result<Link>;

    /// All non-deleted links of an owner. Empty vec, never an error.
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Link>>;

    /// Non-deleted links whose `original_url` appears in `urls`, for any
    /// owner. Owner filtering is the caller's concern.
    async fn batch_exists(&self, urls: &[String]) -> Result<Vec<Link>>;

    /// Bulk insert. Semantics are backend-defined and documented per
    /// backend: the relational backend is transactional (a collision aborts
    /// the whole batch), the file and memory backends skip conflicting rows
    /// under a single lock and return the created subset. Callers needing
    /// exact accounting must re-verify afterwards.
    async fn batch_create(&self, links: Vec<Link>) -> Result<Vec<Link>>;

    /// Mark `deleted_at` for the given codes where they are live and owned
    /// by `owner_id`. Codes that are missing, foreign, or already deleted
    /// are silently skipped. Returns the number of links marked. Idempotent.
    async fn soft_delete(&self, owner_id: i64, codes: &[String]) -> Result<u64>;

    /// Liveness check of the underlying store.
    async fn ping(&self) -> Result<()>;

    async fn backend_info(&self) -> BackendInfo;
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub async fn create() -> Result<Arc<dyn Repository>> {
        let config = get_config();
        let backend = &config.database.backend;

        match backend.as_str() {
            "sqlite" | "mysql" | "postgres" | "mariadb" => {
                let repository =
                    backends::sea_orm::SeaOrmRepository::new(&config.database.database_url, backend)
                        .await?;
                Ok(Arc::new(repository) as Arc<dyn Repository>)
            }
            "file" => {
                let repository = backends::file::FileRepository::new(&config.database.file_path)?;
                Ok(Arc::new(repository) as Arc<dyn Repository>)
            }
            "memory" => Ok(Arc::new(backends::memory::MemoryRepository::new()) as Arc<dyn Repository>),
            _ => {
                error!("Unknown repository backend: {}", backend);
                Err(LinkvaultError::database_config(format!(
                    "Unknown repository backend: {}. Supported: sqlite, mysql, postgres, mariadb, file, memory",
                    backend
                )))
            }
        }
    }
}
