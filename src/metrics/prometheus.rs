//! Prometheus metrics registration and export.
//!
//! Metrics live in process-wide statics populated by [`init_metrics`].
//! Recording before initialisation is a silent no-op.

use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all agentforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Outbound gateway attempts, labeled by backend and outcome.
pub static GATEWAY_ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Finished pipeline runs, labeled by termination reason.
pub static PIPELINE_RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Iterations consumed per pipeline run.
pub static PIPELINE_ITERATIONS: OnceLock<Histogram> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once keeps the first registry.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let gateway_attempts_total = CounterVec::new(
        Opts::new(
            "agentforge_gateway_attempts_total",
            "Outbound backend calls issued by the gateway",
        ),
        &["backend", "outcome"],
    )?;

    let pipeline_runs_total = CounterVec::new(
        Opts::new(
            "agentforge_pipeline_runs_total",
            "Completed refinement pipeline runs",
        ),
        &["termination"],
    )?;

    let pipeline_iterations = Histogram::with_opts(
        HistogramOpts::new(
            "agentforge_pipeline_iterations",
            "Iterations consumed per pipeline run",
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0]),
    )?;

    registry.register(Box::new(gateway_attempts_total.clone()))?;
    registry.register(Box::new(pipeline_runs_total.clone()))?;
    registry.register(Box::new(pipeline_iterations.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = GATEWAY_ATTEMPTS_TOTAL.set(gateway_attempts_total);
    let _ = PIPELINE_RUNS_TOTAL.set(pipeline_runs_total);
    let _ = PIPELINE_ITERATIONS.set(pipeline_iterations);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{record_gateway_attempt, record_pipeline_run};

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(REGISTRY.get().is_some());
    }

    #[test]
    fn test_recorded_metrics_are_exported() {
        init_metrics().expect("metrics init");
        record_gateway_attempt("groq", "success");
        record_pipeline_run("converged", 2);

        let text = export_metrics();
        assert!(!text.starts_with("# Error"));
        assert!(text.contains("agentforge_gateway_attempts_total"));
        assert!(text.contains("backend=\"groq\""));
        assert!(text.contains("agentforge_pipeline_iterations"));
    }
}
