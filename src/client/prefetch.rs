//! # Prefetch Queue
//!
//! Background loading of pages the user is likely to ask for next. Jobs go
//! through an mpsc channel to a worker task; each job sleeps for its delay and
//! then asks the target to load the page.
//!
//! The worker only holds a `Weak` reference to its target, so a dropped cache
//! is never kept alive by pending prefetches.

use super::fingerprint::ListRequest;
use crate::core::types::PaginationInfo;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Something that can load a page into a cache without returning it
#[async_trait]
pub trait PrefetchTarget: Send + Sync + 'static {
    async fn prefetch(self: Arc<Self>, request: ListRequest);
}

/// Timing of follow-up page prefetches
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    pub enabled: bool,

    /// Pages with more items than this get the short delay
    pub large_page_threshold: usize,

    /// Delay for the next page after a large page
    pub large_page_delay: Duration,

    /// Delay for the next page after a small page
    pub small_page_delay: Duration,

    /// Extra delay for the page after next
    pub page_after_next_delay: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            large_page_threshold: 10,
            large_page_delay: Duration::from_millis(500),
            small_page_delay: Duration::from_millis(1000),
            page_after_next_delay: Duration::from_millis(2000),
        }
    }
}

impl PrefetchConfig {
    /// Follow-up jobs after `request` returned `item_count` items with `pagination`
    ///
    /// Search results are never prefetched.
    pub fn plan(
        &self,
        request: &ListRequest,
        item_count: usize,
        pagination: &PaginationInfo,
    ) -> Vec<PrefetchJob> {
        if !self.enabled || request.is_search() || !pagination.has_next {
            return Vec::new();
        }

        let page = request.page_or_first();
        let delay = if item_count > self.large_page_threshold {
            self.large_page_delay
        } else {
            self.small_page_delay
        };

        let mut jobs = vec![PrefetchJob {
            request: request.with_page(page + 1),
            delay,
        }];

        if u64::from(pagination.current_page) + 1 < pagination.total_pages {
            jobs.push(PrefetchJob {
                request: request.with_page(page + 2),
                delay: delay + self.page_after_next_delay,
            });
        }

        jobs
    }
}

/// A page to load after `delay`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchJob {
    pub request: ListRequest,
    pub delay: Duration,
}

/// Channel plus worker task executing prefetch jobs
pub struct PrefetchQueue {
    sender: mpsc::UnboundedSender<PrefetchJob>,
    scheduled: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl PrefetchQueue {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(target: Weak<dyn PrefetchTarget>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<PrefetchJob>();
        let scheduled = Arc::new(AtomicU64::new(0));

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let target = target.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(job.delay).await;
                    match target.upgrade() {
                        Some(target) => {
                            debug!(fingerprint = %job.request.fingerprint(), "Prefetching page");
                            target.prefetch(job.request).await;
                        }
                        None => debug!("Prefetch target dropped, skipping job"),
                    }
                });
            }
        });

        Self {
            sender,
            scheduled,
            worker,
        }
    }

    pub fn enqueue(&self, job: PrefetchJob) {
        if self.sender.send(job).is_ok() {
            self.scheduled.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Jobs accepted since the queue started
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }
}

impl Drop for PrefetchQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
