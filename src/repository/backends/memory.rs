use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::errors::{LinkvaultError, Result};
use crate::repository::{CreateOutcome, Repository};
use crate::structs::{BackendInfo, Link};

/// Embedded in-memory backend.
///
/// Uniqueness is enforced through `DashMap` entries, so racing writers on
/// the same short code see exactly one winner. Nothing is persisted; this
/// backend exists for tests and embedded use.
#[derive(Default)]
pub struct MemoryRepository {
    by_code: DashMap<String, Link>,
    // (owner_id, original_url) -> short_code, live links only
    live_by_owner_url: DashMap<(i64, String), String>,
    next_id: AtomicI64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        MemoryRepository {
            by_code: DashMap::new(),
            live_by_owner_url: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create(&self, mut link: Link) -> Result<CreateOutcome> {
        // 先占内容索引，输掉内容竞争的一方拿回已有记录
        let url_key = (link.owner_id, link.original_url.clone());
        match self.live_by_owner_url.entry(url_key) {
            Entry::Occupied(existing) => {
                let code = existing.get().clone();
                drop(existing);
                let found = self.by_code.get(&code).map(|l| l.clone());
                match found {
                    Some(existing_link) if !existing_link.is_deleted() => {
                        Ok(CreateOutcome::DuplicateUrl(existing_link))
                    }
                    // 索引指向的记录正被并发删除（已打删除标记或已移除），
                    // 当作可重试的创建处理
                    _ => Err(LinkvaultError::code_conflict(format!(
                        "Short code already taken: {}",
                        link.short_code
                    ))),
                }
            }
            Entry::Vacant(url_slot) => {
                link.id = self.next_id.fetch_add(1, Ordering::Relaxed);

                match self.by_code.entry(link.short_code.clone()) {
                    Entry::Occupied(_) => Err(LinkvaultError::code_conflict(format!(
                        "Short code already taken: {}",
                        link.short_code
                    ))),
                    Entry::Vacant(code_slot) => {
                        code_slot.insert(link.clone());
                        url_slot.insert(link.short_code.clone());
                        Ok(CreateOutcome::Created(link))
                    }
                }
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Link> {
        self.by_code
            .get(code)
            .map(|l| l.clone())
            .ok_or_else(|| LinkvaultError::not_found(format!("Link not found: {}", code)))
    }

    async fn get_by_owner_and_url(&self, owner_id: i64, url: &str) -> Result<Link> {
        let code = self
            .live_by_owner_url
            .get(&(owner_id, url.to_string()))
            .map(|c| c.clone());

        code.and_then(|c| self.by_code.get(&c).map(|l| l.clone()))
            .ok_or_else(|| {
                LinkvaultError::not_found(format!("No link for owner {} and url {}", owner_id, url))
            })
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self
            .by_code
            .iter()
            .filter(|entry| entry.owner_id == owner_id && !entry.is_deleted())
            .map(|entry| entry.clone())
            .collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn batch_exists(&self, urls: &[String]) -> Result<Vec<Link>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<Link> = self
            .by_code
            .iter()
            .filter(|entry| !entry.is_deleted() && urls.contains(&entry.original_url))
            .map(|entry| entry.clone())
            .collect();
        matches.sort_by_key(|l| l.id);
        Ok(matches)
    }

    /// Per-row semantics: conflicting rows are skipped, the created subset
    /// is returned.
    async fn batch_create(&self, links_to_insert: Vec<Link>) -> Result<Vec<Link>> {
        let mut created = Vec::with_capacity(links_to_insert.len());
        for link in links_to_insert {
            match self.create(link).await {
                Ok(CreateOutcome::Created(saved)) => created.push(saved),
                Ok(CreateOutcome::DuplicateUrl(_)) => {}
                Err(e) if e.is_code_conflict() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    async fn soft_delete(&self, owner_id: i64, codes: &[String]) -> Result<u64> {
        let now = Utc::now();
        let mut marked = 0u64;

        for code in codes {
            // create 锁 url 索引再锁 by_code；这里释放 by_code 的守卫
            // 之后再动 url 索引，避免两把锁交叉持有
            let url_key = match self.by_code.get_mut(code) {
                Some(mut entry) if entry.owner_id == owner_id && !entry.is_deleted() => {
                    entry.deleted_at = Some(now);
                    Some((entry.owner_id, entry.original_url.clone()))
                }
                _ => None,
            };

            if let Some(key) = url_key {
                self.live_by_owner_url.remove(&key);
                marked += 1;
            }
        }

        Ok(marked)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            backend_type: "memory".into(),
            supports_transactions: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_ignores_deleted_record_behind_url_index() {
        let repo = MemoryRepository::new();
        repo.create(Link::new("https://example.com/x", "racecode", 1))
            .await
            .unwrap();

        // 复现删除中途的状态：删除标记已打、url 索引尚未移除
        repo.by_code.get_mut("racecode").unwrap().deleted_at = Some(Utc::now());

        // 已删除的记录不能作为 DuplicateUrl 返回，创建方换码重试
        let err = repo
            .create(Link::new("https://example.com/x", "newcode1", 1))
            .await
            .unwrap_err();
        assert!(err.is_code_conflict());
    }
}
