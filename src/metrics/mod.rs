//! Metrics module for Prometheus-based monitoring.
//!
//! ```ignore
//! use agentforge::metrics::{init_metrics, export_metrics};
//!
//! init_metrics()?;
//! // ... run pipelines ...
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{record_gateway_attempt, record_pipeline_run};
pub use prometheus::{
    export_metrics, init_metrics, GATEWAY_ATTEMPTS_TOTAL, PIPELINE_ITERATIONS,
    PIPELINE_RUNS_TOTAL, REGISTRY,
};
