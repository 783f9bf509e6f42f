//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `attest_records_submitted_total` - Records accepted into the pending buffer
//! - `attest_records_rejected_total` - Records refused by validation
//! - `attest_blocks_sealed_total` - Blocks sealed since start
//! - `attest_seal_batch_size` - Histogram of records per sealed block
//! - `attest_persistence_failures_total` - Blocks the store failed to save
//! - `attest_chain_length` - Blocks in the chain including genesis
//! - `attest_pending_records` - Records waiting to be sealed
//! - `attest_certificates_issued_total` - Certificates issued and stored

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Records accepted
    pub records_submitted: IntCounter,

    /// Records rejected
    pub records_rejected: IntCounter,

    /// Blocks sealed
    pub blocks_sealed: IntCounter,

    /// Records per sealed block
    pub seal_batch_size: Histogram,

    /// Failed block saves
    pub persistence_failures: IntCounter,

    /// Chain length
    pub chain_length: IntGauge,

    /// Pending records
    pub pending_records: IntGauge,

    /// Certificates issued
    pub certificates_issued: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("blocks_sealed", &self.blocks_sealed.get())
            .field("chain_length", &self.chain_length.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let records_submitted = IntCounter::new(
            "attest_records_submitted_total",
            "Records accepted into the pending buffer",
        )?;
        registry.register(Box::new(records_submitted.clone()))?;

        let records_rejected = IntCounter::new(
            "attest_records_rejected_total",
            "Records refused by validation",
        )?;
        registry.register(Box::new(records_rejected.clone()))?;

        let blocks_sealed =
            IntCounter::new("attest_blocks_sealed_total", "Blocks sealed since start")?;
        registry.register(Box::new(blocks_sealed.clone()))?;

        let seal_batch_size = Histogram::with_opts(
            HistogramOpts::new("attest_seal_batch_size", "Records per sealed block")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        )?;
        registry.register(Box::new(seal_batch_size.clone()))?;

        let persistence_failures = IntCounter::new(
            "attest_persistence_failures_total",
            "Blocks the store failed to save",
        )?;
        registry.register(Box::new(persistence_failures.clone()))?;

        let chain_length = IntGauge::new(
            "attest_chain_length",
            "Blocks in the chain including genesis",
        )?;
        registry.register(Box::new(chain_length.clone()))?;

        let pending_records =
            IntGauge::new("attest_pending_records", "Records waiting to be sealed")?;
        registry.register(Box::new(pending_records.clone()))?;

        let certificates_issued = IntCounter::new(
            "attest_certificates_issued_total",
            "Certificates issued and stored",
        )?;
        registry.register(Box::new(certificates_issued.clone()))?;

        Ok(Self {
            records_submitted,
            records_rejected,
            blocks_sealed,
            seal_batch_size,
            persistence_failures,
            chain_length,
            pending_records,
            certificates_issued,
            registry,
        })
    }

    /// Record an accepted submission
    pub fn record_submitted(&self, pending: usize) {
        self.records_submitted.inc();
        self.pending_records.set(pending as i64);
    }

    /// Record a rejected submission
    pub fn record_rejected(&self) {
        self.records_rejected.inc();
    }

    /// Record a sealed block
    pub fn record_block_sealed(&self, record_count: usize, chain_length: usize) {
        self.blocks_sealed.inc();
        self.seal_batch_size.observe(record_count as f64);
        self.chain_length.set(chain_length as i64);
        self.pending_records.set(0);
    }

    /// Record a failed save
    pub fn record_persistence_failure(&self) {
        self.persistence_failures.inc();
    }

    /// Record an issued certificate
    pub fn record_certificate_issued(&self) {
        self.certificates_issued.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.records_submitted.get(), 0);
        assert_eq!(metrics.blocks_sealed.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        // Each collector owns its registry, so several can coexist
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_rejected();
        assert_eq!(a.records_rejected.get(), 1);
        assert_eq!(b.records_rejected.get(), 0);
    }

    #[test]
    fn test_record_submitted_and_sealed() {
        let metrics = Metrics::new().unwrap();
        metrics.record_submitted(1);
        metrics.record_submitted(2);
        assert_eq!(metrics.records_submitted.get(), 2);
        assert_eq!(metrics.pending_records.get(), 2);

        metrics.record_block_sealed(2, 2);
        assert_eq!(metrics.blocks_sealed.get(), 1);
        assert_eq!(metrics.chain_length.get(), 2);
        assert_eq!(metrics.pending_records.get(), 0);
        assert_eq!(metrics.seal_batch_size.get_sample_count(), 1);
    }

    #[test]
    fn test_persistence_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_persistence_failure();
        assert_eq!(metrics.persistence_failures.get(), 1);
    }

    #[test]
    fn test_certificate_issued() {
        let metrics = Metrics::new().unwrap();
        metrics.record_certificate_issued();
        let text = metrics.encode().unwrap();
        assert!(text.contains("attest_certificates_issued_total 1"));
    }

    #[test]
    fn test_encode() {
        let metrics = Metrics::new().unwrap();
        metrics.record_block_sealed(3, 2);
        let text = metrics.encode().unwrap();
        assert!(text.contains("attest_blocks_sealed_total 1"));
        assert!(text.contains("attest_chain_length 2"));
    }
}
