//! Throttles applied before every outbound backend call.
//!
//! Two independent mechanisms:
//! - [`AdmissionGate`]: at most one call in flight across the whole process.
//! - [`Pacer`]: a minimum interval between consecutive calls to the same backend.
//!
//! Both are owned by the gateway and never exposed for direct mutation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use super::config::BackendKind;

/// Strict single-slot admission gate.
#[derive(Debug, Default)]
pub struct AdmissionGate {
    slot: Mutex<()>,
}

/// Proof of admission; the slot is released on drop.
pub type Admission<'a> = MutexGuard<'a, ()>;

impl AdmissionGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other call is in flight.
    pub async fn admit(&self) -> Admission<'_> {
        self.slot.lock().await
    }

    /// Returns true while a call holds the gate.
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

/// Per-backend minimum-interval pacer.
#[derive(Debug, Default)]
pub struct Pacer {
    min_intervals: HashMap<BackendKind, Duration>,
    last_call: Mutex<HashMap<BackendKind, Instant>>,
}

impl Pacer {
    /// Creates a pacer with no intervals configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum interval for a backend.
    pub fn with_interval(mut self, backend: BackendKind, interval: Duration) -> Self {
        self.min_intervals.insert(backend, interval);
        self
    }

    /// Configured interval for a backend (zero when unset).
    pub fn interval(&self, backend: BackendKind) -> Duration {
        self.min_intervals
            .get(&backend)
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Delays until the backend's interval has elapsed, then stamps the call.
    ///
    /// Returns how long the caller was held back.
    pub async fn wait_turn(&self, backend: BackendKind) -> Duration {
        let interval = self.interval(backend);
        let mut last_call = self.last_call.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(previous) = last_call.get(&backend) {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                waited = interval - elapsed;
                tracing::debug!(
                    backend = %backend,
                    wait_ms = waited.as_millis() as u64,
                    "Pacing call to backend"
                );
                tokio::time::sleep(waited).await;
            }
        }

        last_call.insert(backend, Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_pacer_spaces_calls_to_same_backend() {
        let pacer = Pacer::new().with_interval(BackendKind::Groq, Duration::from_millis(1500));

        let first = pacer.wait_turn(BackendKind::Groq).await;
        assert_eq!(first, Duration::ZERO);

        tokio::time::advance(Duration::from_millis(500)).await;
        let second = pacer.wait_turn(BackendKind::Groq).await;
        assert_eq!(second, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_is_scoped_per_backend() {
        let pacer = Pacer::new()
            .with_interval(BackendKind::Groq, Duration::from_secs(2))
            .with_interval(BackendKind::Gemini, Duration::from_secs(2));

        pacer.wait_turn(BackendKind::Groq).await;
        let other = pacer.wait_turn(BackendKind::Gemini).await;
        assert_eq!(other, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_not_delayed() {
        let pacer = Pacer::new();
        pacer.wait_turn(BackendKind::Ollama).await;
        assert_eq!(pacer.wait_turn(BackendKind::Ollama).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_gate_admits_one_at_a_time() {
        let gate = Arc::new(AdmissionGate::new());
        let held = gate.admit().await;
        assert!(gate.is_busy());

        let contender = Arc::clone(&gate);
        let waiter = tokio::spawn(async move {
            let _admission = contender.admit().await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.expect("waiter should complete");
        assert!(!gate.is_busy());
    }
}
