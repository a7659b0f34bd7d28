//! Composition metrics
//!
//! Prometheus metrics for resources registered, synthesis latency and
//! validation failures. Structured log events are emitted with `tracing`
//! at the call sites.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Histogram buckets for synthesis duration (in seconds)
const SYNTH_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CompositionMetricsInner> = OnceLock::new();

struct CompositionMetricsInner {
    resources_registered: IntCounterVec,
    synth_duration_seconds: Histogram,
    validation_failures: IntCounter,
}

impl CompositionMetricsInner {
    fn new() -> Self {
        Self {
            resources_registered: register_int_counter_vec!(
                "infra_resources_registered_total",
                "Constructs registered in a construction context, by resource type",
                &["type"]
            )
            .expect("Failed to register resources_registered"),

            synth_duration_seconds: register_histogram!(
                "infra_synth_duration_seconds",
                "Time spent validating and rendering a stack",
                SYNTH_BUCKETS.to_vec()
            )
            .expect("Failed to register synth_duration_seconds"),

            validation_failures: register_int_counter!(
                "infra_validation_failures_total",
                "Stacks rejected by pre-render validation"
            )
            .expect("Failed to register validation_failures"),
        }
    }
}

/// Lightweight handle to the global metrics instance.
///
/// Clones share the same underlying metrics.
#[derive(Debug, Clone)]
pub struct CompositionMetrics {
    _private: (),
}

impl Default for CompositionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CompositionMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CompositionMetricsInner {
        GLOBAL_METRICS.get_or_init(CompositionMetricsInner::new)
    }

    pub fn inc_resources_registered(&self, cfn_type: &str) {
        self.inner()
            .resources_registered
            .with_label_values(&[cfn_type])
            .inc();
    }

    pub fn resources_registered(&self, cfn_type: &str) -> u64 {
        self.inner()
            .resources_registered
            .with_label_values(&[cfn_type])
            .get()
    }

    pub fn observe_synth_duration(&self, duration_secs: f64) {
        self.inner().synth_duration_seconds.observe(duration_secs);
    }

    pub fn inc_validation_failures(&self) {
        self.inner().validation_failures.inc();
    }

    pub fn validation_failures(&self) -> u64 {
        self.inner().validation_failures.get()
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
