//! Recording helpers used by the gateway and the pipeline.

use super::prometheus::{GATEWAY_ATTEMPTS_TOTAL, PIPELINE_ITERATIONS, PIPELINE_RUNS_TOTAL};

/// Records one outbound gateway attempt.
///
/// `outcome` is `success`, `rate_limited` or `error`.
pub fn record_gateway_attempt(backend: &str, outcome: &str) {
    if let Some(counter) = GATEWAY_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[backend, outcome]).inc();
    }
}

/// Records a finished pipeline run.
pub fn record_pipeline_run(termination: &str, iterations: u32) {
    if let Some(counter) = PIPELINE_RUNS_TOTAL.get() {
        counter.with_label_values(&[termination]).inc();
    }
    if let Some(histogram) = PIPELINE_ITERATIONS.get() {
        histogram.observe(f64::from(iterations));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_never_panics() {
        record_gateway_attempt("gemini", "rate_limited");
        record_pipeline_run("exhausted", 3);
    }
}
