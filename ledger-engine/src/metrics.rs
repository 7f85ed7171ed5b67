//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the engine.
//!
//! # Metrics
//!
//! - `ledger_transfers_total` - Committed transfers
//! - `ledger_transfers_rejected_total{reason}` - Aborted transfers by error kind
//! - `ledger_transfer_duration_seconds` - Histogram of transfer latencies
//! - `ledger_accounts_created_total` - Accounts created
//!
//! Each engine owns its registry, so several engines can live in one process.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed transfers
    pub transfers_total: IntCounter,

    /// Rejected transfers, labelled by error kind
    pub transfers_rejected: IntCounterVec,

    /// Transfer duration histogram
    pub transfer_duration: Histogram,

    /// Accounts created
    pub accounts_created: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transfers_total", &self.transfers_total.get())
            .field("accounts_created", &self.accounts_created.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total =
            IntCounter::new("ledger_transfers_total", "Total number of committed transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let transfers_rejected = IntCounterVec::new(
            Opts::new(
                "ledger_transfers_rejected_total",
                "Total number of aborted transfers by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(transfers_rejected.clone()))?;

        let transfer_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_transfer_duration_seconds",
                "Histogram of transfer latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(transfer_duration.clone()))?;

        let accounts_created =
            IntCounter::new("ledger_accounts_created_total", "Total number of accounts created")?;
        registry.register(Box::new(accounts_created.clone()))?;

        Ok(Self {
            transfers_total,
            transfers_rejected,
            transfer_duration,
            accounts_created,
            registry,
        })
    }

    /// Record a committed transfer
    pub fn record_transfer(&self, duration_seconds: f64) {
        self.transfers_total.inc();
        self.transfer_duration.observe(duration_seconds);
    }

    /// Record an aborted transfer
    pub fn record_rejection(&self, reason: &str, duration_seconds: f64) {
        self.transfers_rejected.with_label_values(&[reason]).inc();
        self.transfer_duration.observe(duration_seconds);
    }

    /// Record account creation
    pub fn record_account_created(&self) {
        self.accounts_created.inc();
    }

    /// Rejections recorded for `reason`
    pub fn rejections(&self, reason: &str) -> u64 {
        self.transfers_rejected.with_label_values(&[reason]).get()
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
