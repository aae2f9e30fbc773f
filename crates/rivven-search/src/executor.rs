//! Change application
//!
//! Every call provisions the target index first. Write outcomes are reported
//! as success counts: a write the store declines is a soft failure (count 0),
//! not an error. Errors are reserved for fatal conditions and transport
//! failures.

use metrics::counter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::provision::StorageProvisioner;
use crate::store::BulkDocument;
use crate::types::{ChangeRequest, DmlKind};

/// Executor statistics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Documents the store applied
    pub documents_applied: u64,
    /// Documents reported as not applied
    pub documents_rejected: u64,
    /// Bulk requests fully applied
    pub batches_written: u64,
    /// Bulk requests with at least one failed item
    pub batches_failed: u64,
    /// Total time spent in store writes
    pub total_write_time_ms: u64,
}

/// Atomic counters behind [`SyncStats`]
#[derive(Debug, Default)]
pub struct AtomicSyncStats {
    documents_applied: AtomicU64,
    documents_rejected: AtomicU64,
    batches_written: AtomicU64,
    batches_failed: AtomicU64,
    total_write_time_ms: AtomicU64,
}

impl AtomicSyncStats {
    /// Record a single-document outcome
    pub fn record_document(&self, applied: bool, duration: Duration) {
        if applied {
            self.documents_applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.documents_rejected.fetch_add(1, Ordering::Relaxed);
        }
        self.add_time(duration);
    }

    /// Record a fully applied batch
    pub fn record_batch(&self, documents: u64, duration: Duration) {
        self.documents_applied.fetch_add(documents, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    /// Record a batch with failures (reported as entirely rejected)
    pub fn record_batch_failure(&self, documents: u64, duration: Duration) {
        self.documents_rejected
            .fetch_add(documents, Ordering::Relaxed);
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    fn add_time(&self, duration: Duration) {
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            documents_applied: self.documents_applied.load(Ordering::Relaxed),
            documents_rejected: self.documents_rejected.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            total_write_time_ms: self.total_write_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Applies change requests to target stores
#[derive(Debug)]
pub struct SyncExecutor {
    provisioner: Arc<StorageProvisioner>,
    stats: AtomicSyncStats,
}

impl SyncExecutor {
    /// Create an executor
    pub fn new(provisioner: Arc<StorageProvisioner>) -> Self {
        Self {
            provisioner,
            stats: AtomicSyncStats::default(),
        }
    }

    /// Apply one change; returns 1 if the store applied it, else 0
    pub async fn apply(&self, request: &ChangeRequest) -> Result<u64> {
        let table = request.table_meta();
        self.provisioner.ensure(table).await?;
        let store = self.provisioner.stores().get(&table.target_db_id)?;

        let index = request.index_name();
        let id = request.pk.as_str();
        let start = Instant::now();
        let response = match request.kind {
            DmlKind::Insert => store.index_document(index, id, &request.values).await?,
            DmlKind::Update => store.update_document(index, id, &request.values).await?,
            DmlKind::Delete => store.delete_document(index, id).await?,
        };
        let applied = response.is_success();
        self.stats.record_document(applied, start.elapsed());

        if applied {
            counter!("search.documents.applied", "kind" => request.kind.as_str()).increment(1);
            debug!(index, id, kind = %request.kind, "Applied change");
            Ok(1)
        } else {
            counter!("search.documents.rejected", "kind" => request.kind.as_str()).increment(1);
            warn!(
                index,
                id,
                kind = %request.kind,
                status = response.status,
                successful_shards = response.successful_shards,
                "Change not applied"
            );
            Ok(0)
        }
    }

    /// Apply a batch of inserts as one bulk request.
    ///
    /// All requests must be inserts into the same target index. Returns the
    /// batch size if every item succeeded, else 0 (even though the store may
    /// have applied some items).
    pub async fn apply_batch(&self, requests: &[ChangeRequest]) -> Result<u64> {
        let Some(first) = requests.first() else {
            return Ok(0);
        };

        for request in requests {
            if request.kind != DmlKind::Insert {
                return Err(SyncError::invalid_batch(format!(
                    "batch may only contain inserts, found {}",
                    request.kind
                )));
            }
            if request.target_db_id() != first.target_db_id()
                || request.index_name() != first.index_name()
            {
                return Err(SyncError::invalid_batch(format!(
                    "batch mixes targets: {}/{} and {}/{}",
                    first.target_db_id(),
                    first.index_name(),
                    request.target_db_id(),
                    request.index_name()
                )));
            }
        }

        let mut ensured = HashSet::new();
        for request in requests {
            if ensured.insert(request.table.source_table.as_str()) {
                self.provisioner.ensure(request.table_meta()).await?;
            }
        }

        let store = self.provisioner.stores().get(first.target_db_id())?;
        let index = first.index_name();
        let documents: Vec<BulkDocument<'_>> = requests
            .iter()
            .map(|r| BulkDocument {
                id: &r.pk,
                body: &r.values,
            })
            .collect();

        let size = requests.len() as u64;
        let start = Instant::now();
        let response = store.bulk(index, &documents).await?;
        counter!("search.bulk.requests").increment(1);

        if response.has_failures {
            self.stats.record_batch_failure(size, start.elapsed());
            counter!("search.documents.rejected", "kind" => "bulk").increment(size);
            warn!(
                index,
                documents = size,
                failed = response.failed_count(),
                "Bulk request had failures; reporting batch as not applied"
            );
            return Ok(0);
        }

        self.stats.record_batch(size, start.elapsed());
        counter!("search.documents.applied", "kind" => "bulk").increment(size);
        debug!(index, documents = size, "Applied bulk request");
        Ok(size)
    }

    /// Statistics snapshot
    pub fn stats(&self) -> SyncStats {
        self.stats.snapshot()
    }
}
