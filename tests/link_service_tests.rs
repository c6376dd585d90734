//! LinkService tests
//!
//! Business-rule coverage for creation, resolution, batching, and the
//! deletion hand-off, over the in-memory backend.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use linkvault::errors::{LinkvaultError, Result};
use linkvault::repository::backends::MemoryRepository;
use linkvault::repository::{CreateOutcome, Repository};
use linkvault::services::{LinkService, ShortenOutcome, ShortenRequest};
use linkvault::structs::{BackendInfo, Link};
use linkvault::utils::{CODE_LENGTH, is_valid_short_code};

// =============================================================================
// Test Setup
// =============================================================================

fn create_test_service() -> LinkService {
    let repository = Arc::new(MemoryRepository::new()) as Arc<dyn Repository>;
    LinkService::new(repository)
}

/// Repository stub whose create always reports a short-code collision.
struct AlwaysCollidingRepository;

#[async_trait]
impl Repository for AlwaysCollidingRepository {
    async fn create(&self, link: Link) -> Result<CreateOutcome> {
        Err(LinkvaultError::code_conflict(format!(
            "Short code already taken: {}",
            link.short_code
        )))
    }

    async fn get_by_code(&self, code: &str) -> Result<Link> {
        Err(LinkvaultError::not_found(code.to_string()))
    }

    async fn get_by_owner_and_url(&self, _owner_id: i64, url: &str) -> Result<Link> {
        Err(LinkvaultError::not_found(url.to_string()))
    }

    async fn list_by_owner(&self, _owner_id: i64) -> Result<Vec<Link>> {
        Ok(Vec::new())
    }

    async fn batch_exists(&self, _urls: &[String]) -> Result<Vec<Link>> {
        Ok(Vec::new())
    }

    async fn batch_create(&self, _links: Vec<Link>) -> Result<Vec<Link>> {
        Ok(Vec::new())
    }

    async fn soft_delete(&self, _owner_id: i64, _codes: &[String]) -> Result<u64> {
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            backend_type: "stub".into(),
            supports_transactions: false,
        }
    }
}

// =============================================================================
// Single Creation / Resolution
// =============================================================================

#[tokio::test]
async fn test_set_url_then_get_url_roundtrip() {
    let service = create_test_service();

    let outcome = service
        .set_url("https://example.com/page", 1)
        .await
        .expect("set_url failed");
    assert!(!outcome.is_conflict());

    let link = outcome.link();
    assert_eq!(link.original_url, "https://example.com/page");
    assert_eq!(link.owner_id, 1);
    assert_eq!(link.short_code.len(), CODE_LENGTH);
    assert!(is_valid_short_code(&link.short_code));
    assert!(link.id > 0);

    let resolved = service.get_url(&link.short_code).await.expect("get_url failed");
    assert_eq!(resolved.original_url, "https://example.com/page");
    assert_eq!(resolved.owner_id, 1);
}

#[tokio::test]
async fn test_duplicate_set_url_returns_existing_with_conflict() {
    let service = create_test_service();

    let first = service
        .set_url("https://example.com/a", 7)
        .await
        .unwrap()
        .into_link();

    let second = service.set_url("https://example.com/a", 7).await.unwrap();
    assert!(second.is_conflict());
    assert_eq!(second.link().short_code, first.short_code);
    assert_eq!(second.link().id, first.id);
}

#[tokio::test]
async fn test_same_url_different_owners_get_distinct_links() {
    let service = create_test_service();

    let a = service.set_url("https://example.com/shared", 1).await.unwrap();
    let b = service.set_url("https://example.com/shared", 2).await.unwrap();

    assert!(!a.is_conflict());
    assert!(!b.is_conflict());
    assert_ne!(a.link().short_code, b.link().short_code);
}

#[tokio::test]
async fn test_set_url_input_validation() {
    let service = create_test_service();

    let err = service.set_url("", 1).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));

    let err = service.set_url("ftp://example.com", 1).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));

    let err = service.set_url("https://example.com", 0).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));

    let err = service.set_url("https://example.com", -3).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_get_url_rejects_empty_code() {
    let service = create_test_service();
    let err = service.get_url("").await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_get_url_unknown_code_is_not_found() {
    let service = create_test_service();
    let err = service.get_url("zzzzzzzz").await.unwrap_err();
    assert!(matches!(err, LinkvaultError::NotFound(_)));
}

#[tokio::test]
async fn test_set_url_exhausts_retry_budget() {
    let repository = Arc::new(AlwaysCollidingRepository) as Arc<dyn Repository>;
    let service = LinkService::new(repository).with_max_code_attempts(3);

    let err = service.set_url("https://example.com", 1).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::Exhausted(_)));
}

// =============================================================================
// Batch Creation
// =============================================================================

#[tokio::test]
async fn test_batch_create_fresh_inputs() {
    let service = create_test_service();

    let requests: Vec<ShortenRequest> = (0..5)
        .map(|i| ShortenRequest {
            original_url: format!("https://example.com/{}", i),
            owner_id: 1,
        })
        .collect();

    let outcome = service.batch_create(requests).await.unwrap();
    assert_eq!(outcome.links.len(), 5);
    assert_eq!(outcome.created, 5);
    assert_eq!(outcome.existing, 0);
    assert!(!outcome.is_conflict());

    // 输入顺序保持，短码互不相同
    let codes: HashSet<&str> = outcome.links.iter().map(|l| l.short_code.as_str()).collect();
    assert_eq!(codes.len(), 5);
    for (i, link) in outcome.links.iter().enumerate() {
        assert_eq!(link.original_url, format!("https://example.com/{}", i));
    }
}

#[tokio::test]
async fn test_batch_create_rerun_is_conflict_with_codes_unchanged() {
    let service = create_test_service();

    let requests: Vec<ShortenRequest> = (0..4)
        .map(|i| ShortenRequest {
            original_url: format!("https://example.com/{}", i),
            owner_id: 2,
        })
        .collect();

    let first = service.batch_create(requests.clone()).await.unwrap();
    let second = service.batch_create(requests).await.unwrap();

    assert!(second.is_conflict());
    assert_eq!(second.created, 0);
    assert_eq!(second.existing, 4);

    let first_codes: Vec<&str> = first.links.iter().map(|l| l.short_code.as_str()).collect();
    let second_codes: Vec<&str> = second.links.iter().map(|l| l.short_code.as_str()).collect();
    assert_eq!(first_codes, second_codes);
}

#[tokio::test]
async fn test_batch_create_empty_is_invalid() {
    let service = create_test_service();
    let err = service.batch_create(Vec::new()).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_batch_create_mixed_old_and_new() {
    let service = create_test_service();

    service.set_url("https://example.com/old", 3).await.unwrap();

    let outcome = service
        .batch_create(vec![
            ShortenRequest {
                original_url: "https://example.com/old".to_string(),
                owner_id: 3,
            },
            ShortenRequest {
                original_url: "https://example.com/new".to_string(),
                owner_id: 3,
            },
        ])
        .await
        .unwrap();

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.existing, 1);
    assert!(!outcome.is_conflict());
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_get_user_links_empty_is_ok() {
    let service = create_test_service();
    let links = service.get_user_links(42).await.unwrap();
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_get_user_links_rejects_non_positive_owner() {
    let service = create_test_service();
    let err = service.get_user_links(0).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_get_user_links_excludes_deleted() {
    let service = create_test_service();

    let kept = service.set_url("https://example.com/kept", 5).await.unwrap().into_link();
    let dropped = service.set_url("https://example.com/dropped", 5).await.unwrap().into_link();

    let ticket = service.delete_urls(5, vec![dropped.short_code.clone()]).unwrap();
    let summary = ticket.wait().await;
    assert_eq!(summary.deleted, 1);

    let links = service.get_user_links(5).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].short_code, kept.short_code);
}

// =============================================================================
// Deletion Hand-off
// =============================================================================

#[tokio::test]
async fn test_deleted_code_answers_gone_not_not_found() {
    let service = create_test_service();

    let link = service.set_url("https://example.com/x", 9).await.unwrap().into_link();

    let ticket = service.delete_urls(9, vec![link.short_code.clone()]).unwrap();
    let summary = ticket.wait().await;
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.failed, 0);

    let err = service.get_url(&link.short_code).await.unwrap_err();
    assert!(matches!(err, LinkvaultError::Gone(_)));
}

#[tokio::test]
async fn test_delete_urls_empty_list_is_empty_error() {
    let service = create_test_service();
    let err = service.delete_urls(1, Vec::new()).unwrap_err();
    assert!(matches!(err, LinkvaultError::Empty(_)));
}

#[tokio::test]
async fn test_delete_urls_skips_foreign_codes() {
    let service = create_test_service();

    let link = service.set_url("https://example.com/mine", 1).await.unwrap().into_link();

    // owner 2 对 owner 1 的短码执行删除，静默跳过
    let ticket = service.delete_urls(2, vec![link.short_code.clone()]).unwrap();
    let summary = ticket.wait().await;
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.failed, 0);

    assert!(service.get_url(&link.short_code).await.is_ok());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_set_url_all_distinct() {
    let service = Arc::new(create_test_service());

    let mut handles = Vec::new();
    for i in 0..50i64 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .set_url(&format!("https://example.com/item/{}", i), i + 1)
                .await
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        let outcome = handle.await.unwrap().expect("set_url failed");
        assert!(matches!(outcome, ShortenOutcome::Created(_)));
        codes.insert(outcome.into_link().short_code);
    }
    assert_eq!(codes.len(), 50);

    for code in &codes {
        assert!(service.get_url(code).await.is_ok());
    }
}

// =============================================================================
// Liveness
// =============================================================================

#[tokio::test]
async fn test_ping_delegates_to_repository() {
    let service = create_test_service();
    assert!(service.ping().await.is_ok());
}
