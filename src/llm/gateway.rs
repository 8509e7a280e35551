//! The request gateway: the only path by which pipeline stages obtain text.
//!
//! For each request the gateway:
//! 1. Picks the first backend in the purpose's preference list that has a
//!    usable credential.
//! 2. Walks the purpose's credential sub-list, rotating to the next key only
//!    after a rate-limit response and only when the key strategy allows it.
//! 3. Holds the process-wide admission gate and the backend's pacer for every
//!    outbound attempt.
//! 4. For `validation` calls that end `Unavailable`, makes one attempt on the
//!    fallback backend.
//!
//! Backend errors never escape: every call resolves to a [`GenerationOutcome`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::config::{BackendKind, GatewayConfig};
use super::credentials::Credential;
use super::pacing::{AdmissionGate, Pacer};
use super::providers::{build_backends, Backend};
use super::types::{GenerationOutcome, GenerationRequest, Purpose, TextGenerator};
use crate::error::LlmError;
use crate::metrics;

/// Credentials the gateway may use for one call on one backend.
///
/// `None` entries stand for the implicit credential of keyless backends.
type CallCredentials = Vec<Option<Credential>>;

/// Routes generation requests to configured backends.
pub struct Gateway {
    config: GatewayConfig,
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
    gate: AdmissionGate,
    pacer: Pacer,
    attempts: AtomicUsize,
}

impl Gateway {
    /// Creates a gateway over explicit backend implementations.
    pub fn new(config: GatewayConfig, backends: Vec<Arc<dyn Backend>>) -> Self {
        let pacer = BackendKind::ALL.iter().fold(Pacer::new(), |pacer, kind| {
            pacer.with_interval(*kind, config.backend(*kind).min_interval)
        });
        let backends = backends.into_iter().map(|b| (b.kind(), b)).collect();

        Self {
            config,
            backends,
            gate: AdmissionGate::new(),
            pacer,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Creates a gateway with the HTTP backends described by `config`.
    pub fn from_config(config: GatewayConfig) -> Result<Self, LlmError> {
        let backends = build_backends(&config)?;
        Ok(Self::new(config, backends))
    }

    /// The static routing configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Total outbound attempts issued so far.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Backend preference order for a purpose: preferred first, then the
    /// remaining backends in static order.
    pub fn preference(&self, purpose: Purpose) -> Vec<BackendKind> {
        let preferred = self.config.preferred(purpose);
        std::iter::once(preferred)
            .chain(BackendKind::ALL.into_iter().filter(|k| *k != preferred))
            .collect()
    }

    /// Backend that would serve a purpose, if any.
    pub fn route(&self, purpose: Purpose) -> Option<BackendKind> {
        self.preference(purpose)
            .into_iter()
            .find(|kind| self.credentials_for(*kind, purpose).is_some())
    }

    fn credentials_for(&self, kind: BackendKind, purpose: Purpose) -> Option<CallCredentials> {
        let backend = self.backends.get(&kind)?;

        if !backend.requires_credential() {
            if kind == BackendKind::Ollama && !self.config.ollama_selected() {
                return None;
            }
            return Some(vec![None]);
        }

        let credentials: CallCredentials = self
            .config
            .backend(kind)
            .credentials
            .for_purpose(purpose)
            .into_iter()
            .cloned()
            .map(Some)
            .collect();

        if credentials.is_empty() {
            None
        } else {
            Some(credentials)
        }
    }

    /// One outbound attempt under both throttles.
    async fn attempt(
        &self,
        backend: &dyn Backend,
        credential: Option<&Credential>,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        let kind = backend.kind();
        let _admission = self.gate.admit().await;
        self.pacer.wait_turn(kind).await;

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            backend = %kind,
            purpose = %request.purpose,
            role = %request.role,
            credential = credential.map(|c| c.masked()).unwrap_or_default(),
            attempt,
            "Issuing backend call"
        );

        let result = backend.complete(credential, request).await;
        let label = match &result {
            Ok(_) => "success",
            Err(err) if err.is_rate_limit() => "rate_limited",
            Err(_) => "error",
        };
        metrics::record_gateway_attempt(kind.as_str(), label);
        result
    }

    /// Runs a request against one backend, rotating credentials on 429.
    ///
    /// `limit` caps the number of credentials tried.
    async fn call_backend(
        &self,
        kind: BackendKind,
        request: &GenerationRequest,
        limit: Option<usize>,
    ) -> GenerationOutcome {
        let (Some(backend), Some(mut credentials)) = (
            self.backends.get(&kind),
            self.credentials_for(kind, request.purpose),
        ) else {
            return GenerationOutcome::Unavailable;
        };
        if let Some(limit) = limit {
            credentials.truncate(limit);
        }

        let total = credentials.len();
        for (index, credential) in credentials.iter().enumerate() {
            if index > 0 && !self.config.rate_limit_backoff.is_zero() {
                tokio::time::sleep(self.config.rate_limit_backoff).await;
            }

            match self
                .attempt(backend.as_ref(), credential.as_ref(), request)
                .await
            {
                Ok(text) => return GenerationOutcome::from_text(text),
                Err(err) if err.is_rate_limit() && index + 1 < total => {
                    tracing::warn!(
                        backend = %kind,
                        purpose = %request.purpose,
                        error = %err,
                        "Rate limited, rotating to next credential"
                    );
                }
                Err(err) if err.is_rate_limit() => {
                    tracing::warn!(
                        backend = %kind,
                        purpose = %request.purpose,
                        error = %err,
                        "Rate limited with no credentials left"
                    );
                    return GenerationOutcome::RateLimited;
                }
                Err(err) => {
                    tracing::warn!(
                        backend = %kind,
                        purpose = %request.purpose,
                        error = %err,
                        "Backend call failed"
                    );
                    return GenerationOutcome::Unavailable;
                }
            }
        }

        GenerationOutcome::Unavailable
    }
}

#[async_trait]
impl TextGenerator for Gateway {
    async fn generate(&self, request: GenerationRequest) -> GenerationOutcome {
        let Some(primary) = self.route(request.purpose) else {
            tracing::debug!(
                purpose = %request.purpose,
                "No backend has a usable credential for this purpose"
            );
            return GenerationOutcome::Unavailable;
        };

        let outcome = self.call_backend(primary, &request, None).await;

        let fallback = self.config.fallback_backend;
        if request.purpose == Purpose::Validation
            && outcome == GenerationOutcome::Unavailable
            && fallback != primary
            && self.credentials_for(fallback, Purpose::Validation).is_some()
        {
            tracing::warn!(
                from = %primary,
                to = %fallback,
                "Validation call unavailable, trying fallback backend"
            );
            return self.call_backend(fallback, &request, Some(1)).await;
        }

        outcome
    }

    fn has_any_route(&self) -> bool {
        [Purpose::Generation, Purpose::Validation]
            .into_iter()
            .any(|purpose| self.route(purpose).is_some())
    }
}
