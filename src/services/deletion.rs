//! Concurrent soft-deletion pipeline
//!
//! Chunks a deletion request into batches and fans them out to a fixed pool
//! of workers, each retrying transient failures per batch. The caller gets a
//! ticket immediately; the pipeline is best-effort and failures are
//! aggregated into the summary instead of failing the call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::DeletionConfig;
use crate::repository::Repository;

/// Aggregate result of one pipeline run.
///
/// `submitted` may exceed `deleted + failed` when the run was cancelled
/// before every batch was picked up.
#[derive(Debug, Clone, Default)]
pub struct DeletionSummary {
    pub submitted: usize,
    pub deleted: u64,
    pub failed: usize,
    pub failed_codes: Vec<String>,
}

enum BatchOutcome {
    Done(u64),
    Failed(Vec<String>),
}

/// Acceptance handle for an in-flight deletion request.
#[derive(Debug)]
pub struct DeletionTicket {
    handle: JoinHandle<DeletionSummary>,
    shutdown: watch::Sender<bool>,
}

impl DeletionTicket {
    /// Ask the pipeline to stop picking up new batches. In-flight batches
    /// drain normally.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the run to finish and collect the summary.
    pub async fn wait(self) -> DeletionSummary {
        self.handle.await.unwrap_or_else(|e| {
            error!("Deletion pipeline task failed: {}", e);
            DeletionSummary::default()
        })
    }
}

pub struct DeletionPipeline {
    repository: Arc<dyn Repository>,
    config: DeletionConfig,
}

impl DeletionPipeline {
    pub fn new(repository: Arc<dyn Repository>, config: DeletionConfig) -> Self {
        DeletionPipeline { repository, config }
    }

    /// Spawn the run on the runtime and hand back a ticket.
    ///
    /// The ticket may be dropped freely; an accepted run always proceeds to
    /// completion unless [`DeletionTicket::cancel`] was called first.
    pub fn spawn(self, owner_id: i64, codes: Vec<String>) -> DeletionTicket {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(owner_id, codes, shutdown_rx));
        DeletionTicket {
            handle,
            shutdown: shutdown_tx,
        }
    }

    /// Run the full fan-out/fan-in cycle and return the summary.
    pub async fn run(
        self,
        owner_id: i64,
        codes: Vec<String>,
        shutdown: watch::Receiver<bool>,
    ) -> DeletionSummary {
        let submitted = codes.len();
        let batch_size = self.config.batch_size.max(1);
        let workers = self.config.workers.max(1);

        let batches: Vec<Vec<String>> = codes
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        debug!(
            "DeletionPipeline: owner {} submitted {} codes in {} batches",
            owner_id,
            submitted,
            batches.len()
        );

        // 有界工作队列，防止一次性把全部批次压进内存通道
        let (work_tx, work_rx) = mpsc::channel::<Vec<String>>(workers * 2);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<BatchOutcome>();

        let mut worker_handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let repository = self.repository.clone();
            let work_rx = work_rx.clone();
            let results_tx = results_tx.clone();
            let shutdown = shutdown.clone();
            let max_retries = self.config.max_retries.max(1);

            worker_handles.push(tokio::spawn(async move {
                Self::worker(
                    repository,
                    owner_id,
                    work_rx,
                    results_tx,
                    shutdown,
                    max_retries,
                )
                .await;
            }));
        }
        // 队列和收集端的关闭都只系于 worker 持有的句柄
        drop(work_rx);
        drop(results_tx);

        let collector = tokio::spawn(async move {
            let mut summary = DeletionSummary {
                submitted,
                ..Default::default()
            };
            while let Some(outcome) = results_rx.recv().await {
                match outcome {
                    BatchOutcome::Done(count) => summary.deleted += count,
                    BatchOutcome::Failed(codes) => {
                        summary.failed += codes.len();
                        summary.failed_codes.extend(codes);
                    }
                }
            }
            summary
        });

        // 生产者：每个批次投递前检查取消标志。取消后 worker 退出、
        // 接收端关闭，阻塞中的 send 以 Err 返回，同样结束投递。
        // 取消标志只认显式的 cancel；sender 被丢弃不算取消
        for batch in batches {
            if *shutdown.borrow() {
                break;
            }
            if work_tx.send(batch).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        for handle in worker_handles {
            if let Err(e) = handle.await {
                error!("Deletion worker panicked: {}", e);
            }
        }

        let summary = collector.await.unwrap_or_else(|e| {
            error!("Deletion collector failed: {}", e);
            DeletionSummary {
                submitted,
                ..Default::default()
            }
        });

        info!(
            "DeletionPipeline: owner {} done, {} deleted, {} failed of {} submitted",
            owner_id, summary.deleted, summary.failed, summary.submitted
        );
        summary
    }

    async fn worker(
        repository: Arc<dyn Repository>,
        owner_id: i64,
        work_rx: Arc<Mutex<mpsc::Receiver<Vec<String>>>>,
        results_tx: mpsc::UnboundedSender<BatchOutcome>,
        shutdown: watch::Receiver<bool>,
        max_retries: usize,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = {
                let mut rx = work_rx.lock().await;
                rx.recv().await
            };
            let Some(batch) = batch else {
                break;
            };

            let mut attempt = 0;
            loop {
                attempt += 1;
                match repository.soft_delete(owner_id, &batch).await {
                    Ok(count) => {
                        let _ = results_tx.send(BatchOutcome::Done(count));
                        break;
                    }
                    Err(e) if attempt < max_retries && !*shutdown.borrow() => {
                        warn!(
                            "DeletionPipeline: batch of {} failed (attempt {}/{}): {}",
                            batch.len(),
                            attempt,
                            max_retries,
                            e
                        );
                        sleep(Duration::from_millis(50 * attempt as u64)).await;
                    }
                    Err(e) => {
                        error!(
                            "DeletionPipeline: batch of {} giving up after {} attempts: {}",
                            batch.len(),
                            attempt,
                            e
                        );
                        let _ = results_tx.send(BatchOutcome::Failed(batch));
                        break;
                    }
                }
            }
        }
    }
}
