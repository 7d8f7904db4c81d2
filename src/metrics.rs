#![allow(dead_code)] // This entire file is feature-gated
//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! Decision, rewrap and reload events are handed to a [`MetricsSink`] so
//! consumers can forward them to whatever backend they run (Prometheus,
//! OpenTelemetry, CloudWatch, ...) without this crate depending on one.
//!
//! **Note:** This module is only available when the `observability` feature is enabled.
//!
//! ## Usage
//!
//! ```ignore
//! use tdfgate_core::metrics::{DecisionStats, MetricsSink, ReloadStats};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct PermitCounter {
//!     permits: AtomicU64,
//! }
//!
//! impl MetricsSink for PermitCounter {
//!     fn on_decision(&self, stats: &DecisionStats) {
//!         if stats.permitted {
//!             self.permits.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn on_reload(&self, stats: &ReloadStats) {
//!         eprintln!("policy {} loaded", stats.hash);
//!     }
//! }
//!
//! tdfgate_core::metrics::set_sink(Arc::new(PermitCounter { permits: AtomicU64::new(0) }));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

/// One decided (entity chain, resource attribute set) pair, passed to
/// [`MetricsSink::on_decision`].
#[derive(Debug, Clone, Serialize)]
pub struct DecisionStats {
    /// Time spent on this pair, including entitlement resolution when it
    /// was not already cached for the chain.
    pub duration: Duration,
    pub permitted: bool,
    pub entity_chain_id: String,
    pub resource_attributes_id: String,
    pub action: String,
}

/// Per-phase timings of one decision, in milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionPhases {
    /// Resolving entitlements for the chain. Zero when they came from the
    /// per-request cache.
    pub resolve_ms: f64,
    /// Grouping FQNs and applying attribute rules.
    pub rules_ms: f64,
    /// Wall-clock time of the whole decision, measured separately from
    /// the phases.
    pub total_ms: f64,
}

impl DecisionPhases {
    /// Time not accounted for in measured phases.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms - (self.resolve_ms + self.rules_ms)
    }
}

/// Outcome of one rewrap call.
#[derive(Debug, Clone, Serialize)]
pub struct RewrapStats {
    pub duration: Duration,
    /// Policy uuid, empty when the request body could not be read.
    pub policy_id: String,
    /// `None` on success, otherwise the status name of the error.
    pub error_code: Option<String>,
}

impl RewrapStats {
    pub fn succeeded(&self) -> bool {
        self.error_code.is_none()
    }
}

/// A policy snapshot was swapped in.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadStats {
    pub reload_time: std::time::SystemTime,
    /// SHA-256 of the new policy document.
    pub hash: String,
}

/// Consumer of decision, rewrap and reload metrics.
///
/// Sinks are called synchronously on the request path, possibly from many
/// threads at once, so implementations must be cheap and thread-safe.
/// Without a call to [`set_sink`] a no-op sink is used.
pub trait MetricsSink: Send + Sync {
    /// Called once per decided pair.
    fn on_decision(&self, stats: &DecisionStats);

    /// Called after each successful policy reload.
    fn on_reload(&self, stats: &ReloadStats);

    /// Called after each rewrap, successful or not.
    fn on_rewrap(&self, _stats: &RewrapStats) {}

    /// Called with per-phase timings alongside [`MetricsSink::on_decision`].
    fn on_decision_phases(&self, _stats: &DecisionStats, _phases: &DecisionPhases) {}
}

/// No-op sink; metrics are silently dropped.
struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_decision(&self, _stats: &DecisionStats) {}
    fn on_reload(&self, _stats: &ReloadStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

fn sink() -> Arc<dyn MetricsSink> {
    SINK.get_or_init(|| Arc::new(NoOpSink)).clone()
}

/// Set the global metrics sink.
///
/// Call this once at startup, before the first decision. The sink cannot be
/// replaced afterwards; later calls are ignored with a warning.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            "Metrics sink was already initialized. Ignoring subsequent set_sink call. Set the sink before the first decision."
        );
    }
}

pub(crate) fn get_sink() -> Arc<dyn MetricsSink> {
    sink()
}

pub(crate) fn record_decision(stats: DecisionStats, phases: DecisionPhases) {
    let sink = get_sink();
    sink.on_decision(&stats);
    sink.on_decision_phases(&stats, &phases);
}

pub(crate) fn record_rewrap(duration: Duration, policy_id: String, error_code: Option<String>) {
    get_sink().on_rewrap(&RewrapStats {
        duration,
        policy_id,
        error_code,
    });
}

pub(crate) fn record_reload(hash: String) {
    get_sink().on_reload(&ReloadStats {
        reload_time: std::time::SystemTime::now(),
        hash,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(permitted: bool) -> DecisionStats {
        DecisionStats {
            duration: Duration::from_millis(42),
            permitted,
            entity_chain_id: "ec1".to_string(),
            resource_attributes_id: "ra1".to_string(),
            action: "decrypt".to_string(),
        }
    }

    #[test]
    fn test_decision_stats_serialization() {
        let json = serde_json::to_value(stats(true)).unwrap();
        assert_eq!(json["permitted"], true);
        assert_eq!(json["entity_chain_id"], "ec1");
        assert_eq!(json["action"], "decrypt");
    }

    #[test]
    fn test_phase_overhead() {
        let phases = DecisionPhases {
            resolve_ms: 1.5,
            rules_ms: 0.5,
            total_ms: 2.25,
        };
        assert!((phases.overhead_ms() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rewrap_stats_outcome() {
        let ok = RewrapStats {
            duration: Duration::from_millis(3),
            policy_id: "p1".to_string(),
            error_code: None,
        };
        let denied = RewrapStats {
            error_code: Some("PERMISSION_DENIED".to_string()),
            ..ok.clone()
        };
        assert!(ok.succeeded());
        assert!(!denied.succeeded());
    }

    #[test]
    fn test_record_with_no_op_sink() {
        let phases = DecisionPhases {
            resolve_ms: 0.0,
            rules_ms: 0.0,
            total_ms: 0.0,
        };
        record_decision(stats(false), phases);
        record_rewrap(Duration::from_millis(1), "p1".to_string(), None);
        record_reload("abc".to_string());
    }

    #[test]
    fn test_noop_sink_impl() {
        let sink = NoOpSink;
        sink.on_decision(&stats(true));
        sink.on_reload(&ReloadStats {
            reload_time: std::time::SystemTime::now(),
            hash: "abc".to_string(),
        });
        sink.on_rewrap(&RewrapStats {
            duration: Duration::ZERO,
            policy_id: String::new(),
            error_code: None,
        });
    }
}
