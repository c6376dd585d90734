use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::errors::{LinkvaultError, Result};
use crate::repository::{CreateOutcome, Repository};
use crate::structs::{BackendInfo, Link, SerializableLink};

/// Append-only JSON-lines backend.
///
/// One record per line; a later record for a code supersedes earlier ones,
/// so soft deletes and rewrites are plain appends. The full log is replayed
/// into memory at startup. Writes take a single lock, which is what stands
/// in for transactions here.
pub struct FileRepository {
    file_path: PathBuf,
    state: RwLock<FileState>,
}

struct FileState {
    by_code: HashMap<String, Link>,
    next_id: i64,
}

impl FileRepository {
    pub fn new(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();

        if !file_path.exists() {
            fs::write(&file_path, "")?;
            info!("Created empty link log: {}", file_path.display());
        }

        let state = Self::replay(&file_path)?;
        info!(
            "Loaded {} links from {}",
            state.by_code.len(),
            file_path.display()
        );

        Ok(FileRepository {
            file_path,
            state: RwLock::new(state),
        })
    }

    /// 重放日志，按出现顺序覆盖同一短码的旧记录
    fn replay(file_path: &PathBuf) -> Result<FileState> {
        let content = fs::read_to_string(file_path)?;

        let mut by_code: HashMap<String, Link> = HashMap::new();
        let mut next_id: i64 = 1;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SerializableLink>(line) {
                Ok(record) => {
                    let link: Link = record.into();
                    next_id = next_id.max(link.id + 1);
                    by_code.insert(link.short_code.clone(), link);
                }
                Err(e) => {
                    warn!("Skipping malformed record at line {}: {}", line_no + 1, e);
                }
            }
        }

        Ok(FileState { by_code, next_id })
    }

    fn append_records(&self, links: &[&Link]) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.file_path)?;
        for link in links {
            let record = SerializableLink::from(*link);
            let json = serde_json::to_string(&record)?;
            writeln!(file, "{}", json)?;
        }
        Ok(())
    }

    fn find_live_duplicate(state: &FileState, owner_id: i64, url: &str) -> Option<Link> {
        state
            .by_code
            .values()
            .find(|l| l.owner_id == owner_id && l.original_url == url && !l.is_deleted())
            .cloned()
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn create(&self, mut link: Link) -> Result<CreateOutcome> {
        let mut state = self.state.write();

        if let Some(existing) = Self::find_live_duplicate(&state, link.owner_id, &link.original_url)
        {
            return Ok(CreateOutcome::DuplicateUrl(existing));
        }

        // 短码占用检查覆盖软删除记录：短码永不回收
        if state.by_code.contains_key(&link.short_code) {
            return Err(LinkvaultError::code_conflict(format!(
                "Short code already taken: {}",
                link.short_code
            )));
        }

        link.id = state.next_id;
        state.next_id += 1;

        self.append_records(&[&link])?;
        state.by_code.insert(link.short_code.clone(), link.clone());

        Ok(CreateOutcome::Created(link))
    }

    async fn get_by_code(&self, code: &str) -> Result<Link> {
        self.state
            .read()
            .by_code
            .get(code)
            .cloned()
            .ok_or_else(|| LinkvaultError::not_found(format!("Link not found: {}", code)))
    }

    async fn get_by_owner_and_url(&self, owner_id: i64, url: &str) -> Result<Link> {
        Self::find_live_duplicate(&self.state.read(), owner_id, url).ok_or_else(|| {
            LinkvaultError::not_found(format!("No link for owner {} and url {}", owner_id, url))
        })
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = self
            .state
            .read()
            .by_code
            .values()
            .filter(|l| l.owner_id == owner_id && !l.is_deleted())
            .cloned()
            .collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn batch_exists(&self, urls: &[String]) -> Result<Vec<Link>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read();
        let mut matches: Vec<Link> = state
            .by_code
            .values()
            .filter(|l| !l.is_deleted() && urls.contains(&l.original_url))
            .cloned()
            .collect();
        matches.sort_by_key(|l| l.id);
        Ok(matches)
    }

    /// Not transactional: conflicting rows are skipped under one lock and
    /// the created subset is returned. An I/O failure aborts the remainder.
    async fn batch_create(&self, links_to_insert: Vec<Link>) -> Result<Vec<Link>> {
        let mut state = self.state.write();
        let mut created = Vec::with_capacity(links_to_insert.len());

        for mut link in links_to_insert {
            if state.by_code.contains_key(&link.short_code)
                || Self::find_live_duplicate(&state, link.owner_id, &link.original_url).is_some()
            {
                continue;
            }

            link.id = state.next_id;
            state.next_id += 1;

            self.append_records(&[&link])?;
            state.by_code.insert(link.short_code.clone(), link.clone());
            created.push(link);
        }

        Ok(created)
    }

    async fn soft_delete(&self, owner_id: i64, codes: &[String]) -> Result<u64> {
        let mut state = self.state.write();
        let now = Utc::now();
        let mut marked = Vec::new();

        for code in codes {
            match state.by_code.get(code) {
                Some(link) if link.owner_id == owner_id && !link.is_deleted() => {
                    let mut updated = link.clone();
                    updated.deleted_at = Some(now);
                    marked.push(updated);
                }
                // 不属于该 owner、已删除或不存在的短码一律静默跳过
                _ => {}
            }
        }

        if marked.is_empty() {
            return Ok(0);
        }

        self.append_records(&marked.iter().collect::<Vec<_>>())?;
        let count = marked.len() as u64;
        for link in marked {
            state.by_code.insert(link.short_code.clone(), link);
        }

        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        fs::metadata(&self.file_path).map_err(|e| {
            LinkvaultError::file_operation(format!("Link log is not accessible: {}", e))
        })?;
        Ok(())
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            backend_type: "file".into(),
            supports_transactions: false,
        }
    }
}
