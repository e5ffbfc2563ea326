//! Admission Metrics
//!
//! Lock-free counters shared by discovery and the node registry.
//! Follows the cache-line aligned layout used for drive metrics.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

/// Counters for volume discovery and admission decisions
#[repr(C, align(64))]
#[derive(Debug)]
pub struct AdmissionMetrics {
    /// Volumes resolved to a CSI driver
    pub resolved_volumes: AtomicU64,
    /// Volumes skipped because no driver could be resolved
    pub skipped_volumes: AtomicU64,
    /// Candidates that passed the limit check
    pub admitted: AtomicU64,
    /// Candidates rejected by a driver limit
    pub rejected: AtomicU64,
    /// Pods committed to a node
    pub commits: AtomicU64,
    /// Pods removed from a node
    pub removals: AtomicU64,
    /// Last update timestamp (Unix millis)
    pub last_update_ms: AtomicU64,
    _padding: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<AdmissionMetrics>() <= CACHE_LINE_SIZE);

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self {
            resolved_volumes: AtomicU64::new(0),
            skipped_volumes: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            removals: AtomicU64::new(0),
            last_update_ms: AtomicU64::new(0),
            _padding: [0; 8],
        }
    }

    #[inline]
    pub fn record_resolved(&self, count: u64) {
        self.resolved_volumes.fetch_add(count, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_skipped(&self, count: u64) {
        self.skipped_volumes.fetch_add(count, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    #[inline]
    fn touch(&self) {
        self.last_update_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Release);
    }

    pub fn snapshot(&self) -> AdmissionMetricsSnapshot {
        AdmissionMetricsSnapshot {
            resolved_volumes: self.resolved_volumes.load(Ordering::Relaxed),
            skipped_volumes: self.skipped_volumes.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`AdmissionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AdmissionMetricsSnapshot {
    pub resolved_volumes: u64,
    pub skipped_volumes: u64,
    pub admitted: u64,
    pub rejected: u64,
    pub commits: u64,
    pub removals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert_eq!(std::mem::align_of::<AdmissionMetrics>(), CACHE_LINE_SIZE);
    }

    #[test]
    fn test_counters() {
        let metrics = AdmissionMetrics::new();
        metrics.record_resolved(3);
        metrics.record_skipped(1);
        metrics.record_admitted();
        metrics.record_rejected();
        metrics.record_commit();

        let snap = metrics.snapshot();
        assert_eq!(snap.resolved_volumes, 3);
        assert_eq!(snap.skipped_volumes, 1);
        assert_eq!(snap.admitted, 1);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.commits, 1);
        assert_eq!(snap.removals, 0);
        assert!(metrics.last_update_ms.load(Ordering::Acquire) > 0);
    }
}
