//! Link management service
//!
//! Single source of business rules above the registry: validation, the
//! code-generation retry loop, batch partitioning, and deletion hand-off.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DeletionConfig, get_config};
use crate::errors::{LinkvaultError, Result};
use crate::repository::{CreateOutcome, Repository};
use crate::services::deletion::{DeletionPipeline, DeletionTicket};
use crate::structs::Link;
use crate::utils::{generate_random_code, validate_url};

/// One item of a batch creation request.
#[derive(Debug, Clone)]
pub struct ShortenRequest {
    pub original_url: String,
    pub owner_id: i64,
}

/// Outcome of a single creation.
///
/// `Existing` is the content-conflict signal: the same `(url, owner)` was
/// already registered, and the caller receives the earlier record instead
/// of a duplicate. Collaborator layers map it to their own response
/// semantics (an HTTP layer would answer 409 with the existing short URL).
#[derive(Debug, Clone)]
pub enum ShortenOutcome {
    Created(Link),
    Existing(Link),
}

impl ShortenOutcome {
    pub fn link(&self) -> &Link {
        match self {
            ShortenOutcome::Created(link) => link,
            ShortenOutcome::Existing(link) => link,
        }
    }

    pub fn into_link(self) -> Link {
        match self {
            ShortenOutcome::Created(link) => link,
            ShortenOutcome::Existing(link) => link,
        }
    }

    /// True when the request collided with an already-registered link.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ShortenOutcome::Existing(_))
    }
}

/// Outcome of a batch creation, preserving input order in `links`.
#[derive(Debug, Clone, Default)]
pub struct BatchShortenOutcome {
    pub links: Vec<Link>,
    pub created: usize,
    pub existing: usize,
}

impl BatchShortenOutcome {
    /// True when nothing new was created, i.e. every input already existed.
    pub fn is_conflict(&self) -> bool {
        self.created == 0
    }
}

/// Service for link registry operations.
///
/// Stateless; safe to share behind an `Arc` and call concurrently.
pub struct LinkService {
    repository: Arc<dyn Repository>,
    max_code_attempts: usize,
    deletion: DeletionConfig,
}

impl LinkService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        let config = get_config();
        LinkService {
            repository,
            max_code_attempts: config.features.max_code_attempts.max(1),
            deletion: config.deletion.clone(),
        }
    }

    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts.max(1);
        self
    }

    pub fn with_deletion_config(mut self, config: DeletionConfig) -> Self {
        self.deletion = config;
        self
    }

    fn check_owner(owner_id: i64) -> Result<()> {
        if owner_id <= 0 {
            return Err(LinkvaultError::invalid_request(format!(
                "Owner id must be positive, got {}",
                owner_id
            )));
        }
        Ok(())
    }

    fn check_url(url: &str) -> Result<()> {
        validate_url(url).map_err(|e| LinkvaultError::invalid_request(e.to_string()))
    }

    /// Resolve a short code to its link.
    ///
    /// Soft-deleted links answer `Gone`, distinctly from `NotFound`; the
    /// collaborator layer decides what 410 vs 404 looks like.
    pub async fn get_url(&self, code: &str) -> Result<Link> {
        if code.is_empty() {
            return Err(LinkvaultError::invalid_request("Short code cannot be empty"));
        }

        let link = self.repository.get_by_code(code).await?;
        if link.is_deleted() {
            return Err(LinkvaultError::gone(format!("Link was deleted: {}", code)));
        }
        Ok(link)
    }

    /// Register a URL for an owner, generating a fresh short code.
    ///
    /// Per attempt: generate, probe the registry with an atomic insert. A
    /// code collision means another link holds the generated code, so a new
    /// code is drawn, up to `max_code_attempts`; running out of attempts is
    /// fatal and surfaces as `Exhausted`, since it signals a pathological
    /// random source or an oversaturated code space. A content collision
    /// ends the loop immediately with the existing record.
    pub async fn set_url(&self, original_url: &str, owner_id: i64) -> Result<ShortenOutcome> {
        Self::check_url(original_url)?;
        Self::check_owner(owner_id)?;

        for attempt in 1..=self.max_code_attempts {
            let code = generate_random_code();
            let candidate = Link::new(original_url, code, owner_id);

            match self.repository.create(candidate).await {
                Ok(CreateOutcome::Created(link)) => {
                    info!(
                        "LinkService: created '{}' -> '{}' for owner {}",
                        link.short_code, link.original_url, owner_id
                    );
                    return Ok(ShortenOutcome::Created(link));
                }
                Ok(CreateOutcome::DuplicateUrl(existing)) => {
                    info!(
                        "LinkService: owner {} already has '{}' as '{}'",
                        owner_id, original_url, existing.short_code
                    );
                    return Ok(ShortenOutcome::Existing(existing));
                }
                Err(e) if e.is_code_conflict() => {
                    warn!(
                        "LinkService: code collision on attempt {}/{}, regenerating",
                        attempt, self.max_code_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(LinkvaultError::exhausted(format!(
            "Could not find a free short code in {} attempts",
            self.max_code_attempts
        )))
    }

    /// Create many links at once.
    ///
    /// Pre-existing `(url, owner)` pairs are returned as-is; the rest go
    /// through the same per-code retry loop as [`Self::set_url`]. The
    /// result preserves input order. `is_conflict()` on the outcome flags
    /// the everything-already-existed case.
    pub async fn batch_create(&self, requests: Vec<ShortenRequest>) -> Result<BatchShortenOutcome> {
        if requests.is_empty() {
            return Err(LinkvaultError::invalid_request(
                "Batch creation requires at least one link",
            ));
        }
        for request in &requests {
            Self::check_url(&request.original_url)?;
            Self::check_owner(request.owner_id)?;
        }

        let urls: Vec<String> = requests.iter().map(|r| r.original_url.clone()).collect();
        let known = self.repository.batch_exists(&urls).await?;

        let mut outcome = BatchShortenOutcome::default();
        for request in requests {
            // batch_exists 不区分 owner，这里按 owner 过滤
            let pre_existing = known
                .iter()
                .find(|l| l.owner_id == request.owner_id && l.original_url == request.original_url)
                .cloned();

            match pre_existing {
                Some(link) => {
                    outcome.existing += 1;
                    outcome.links.push(link);
                }
                None => match self.set_url(&request.original_url, request.owner_id).await? {
                    ShortenOutcome::Created(link) => {
                        outcome.created += 1;
                        outcome.links.push(link);
                    }
                    // 同一批次里重复的 (url, owner) 在这里兜底
                    ShortenOutcome::Existing(link) => {
                        outcome.existing += 1;
                        outcome.links.push(link);
                    }
                },
            }
        }

        info!(
            "LinkService: batch created {} links, {} pre-existing",
            outcome.created, outcome.existing
        );
        Ok(outcome)
    }

    /// All live links of an owner. An empty result is not an error.
    pub async fn get_user_links(&self, owner_id: i64) -> Result<Vec<Link>> {
        Self::check_owner(owner_id)?;
        self.repository.list_by_owner(owner_id).await
    }

    /// Hand a soft-delete request to the deletion pipeline.
    ///
    /// Returns as soon as the request is accepted; the ticket resolves to
    /// the best-effort summary. Codes not owned by `owner_id` are skipped
    /// by the registry.
    pub fn delete_urls(&self, owner_id: i64, codes: Vec<String>) -> Result<DeletionTicket> {
        Self::check_owner(owner_id)?;
        if codes.is_empty() {
            return Err(LinkvaultError::empty("No codes to delete"));
        }

        info!(
            "LinkService: accepted deletion of {} codes for owner {}",
            codes.len(),
            owner_id
        );
        let pipeline = DeletionPipeline::new(self.repository.clone(), self.deletion.clone());
        Ok(pipeline.spawn(owner_id, codes))
    }

    /// Liveness of the underlying store.
    pub async fn ping(&self) -> Result<()> {
        self.repository.ping().await.map_err(|e| {
            LinkvaultError::database_connection(format!("Storage liveness check failed: {}", e))
        })
    }
}
