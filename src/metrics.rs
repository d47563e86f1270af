use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing cache and ingestion activity.
#[derive(Default)]
pub struct SyncMetrics {
    cache_hits: AtomicU64,
    downloads: AtomicU64,
    unresolved: AtomicU64,
    uploads: AtomicU64,
    ingestion_failures: AtomicU64,
}

impl SyncMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup satisfied from the local cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file streamed from LlamaCloud to disk.
    pub fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss that could not be filled.
    pub fn record_unresolved(&self) {
        self.unresolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file registered with a pipeline.
    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ingestion that failed or timed out.
    pub fn record_ingestion_failure(&self) {
        self.ingestion_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            ingestion_failures: self.ingestion_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of sync counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncMetricsSnapshot {
    /// Lookups answered by an existing local file.
    pub cache_hits: u64,
    /// Files downloaded since startup.
    pub downloads: u64,
    /// Cache misses that stayed unfilled (no remote match or a remote failure).
    pub unresolved: u64,
    /// Files uploaded and registered with a pipeline.
    pub uploads: u64,
    /// Uploads whose ingestion reported an error or never completed.
    pub ingestion_failures: u64,
}
