//! Delivery Pipeline - Idempotent artifact delivery
//!
//! Per artifact:
//! 1. Fingerprint `(content, name)`
//! 2. Skip if the sent-record cache saw the digest within its TTL
//! 3. Transmit with an idempotency key, retrying transport faults and 5xx
//!    responses with exponential backoff; 4xx responses are terminal
//! 4. Record the digest as sent on a 2xx response
//!
//! Failures are returned as an outcome, never raised.

use crate::application::sent_record_cache::SentRecordCache;
use crate::domain::entities::DeliveryArtifact;
use crate::domain::ports::DeliveryTransport;
use std::sync::Arc;
use std::time::Duration;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each one after.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
        }
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(5),
        }
    }

    /// Wait before `attempt` (1-based): none for the first, then
    /// `backoff_base * 2^(attempt - 2)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff_base * 2u32.saturating_pow(attempt - 2)
        }
    }
}

/// Result of delivering one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Already sent within the TTL; nothing transmitted.
    Deduplicated,
    /// Accepted by the endpoint.
    Sent { attempts: u32 },
    /// Gave up, either on a client error or after exhausting attempts.
    Failed { attempts: u32, reason: String },
}

impl DeliveryOutcome {
    /// Callers treat a deduplicated artifact exactly like a fresh send.
    pub fn is_success(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed { .. })
    }
}

pub struct DeliveryPipeline {
    transport: Arc<dyn DeliveryTransport>,
    cache: Arc<SentRecordCache>,
    retry: RetryPolicy,
    idempotency_prefix: String,
}

impl DeliveryPipeline {
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        cache: Arc<SentRecordCache>,
        retry: RetryPolicy,
        idempotency_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            retry,
            idempotency_prefix: idempotency_prefix.into(),
        }
    }

    pub async fn deliver(&self, artifact: &DeliveryArtifact) -> DeliveryOutcome {
        let digest = artifact.digest();

        if let Some(previous) = self.cache.lookup(&digest) {
            tracing::info!(
                digest = %digest,
                "{} already sent at {}, skipping",
                artifact.name,
                previous.sent_at.format("%Y/%m/%d %H:%M:%S")
            );
            return DeliveryOutcome::Deduplicated;
        }

        let key = digest.idempotency_key(&self.idempotency_prefix);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        tracing::info!(digest = %digest, "sending {}", artifact.name);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let wait = self.retry.delay_before(attempt);
                tracing::info!(
                    attempt,
                    "retry {}/{} after {:?}",
                    attempt,
                    max_attempts,
                    wait
                );
                tokio::time::sleep(wait).await;
            }

            match self.transport.send(artifact, &key).await {
                Ok(response) if response.is_success() => {
                    tracing::info!(
                        digest = %digest,
                        attempt,
                        status = response.status,
                        "sent {}",
                        artifact.name
                    );
                    self.cache.mark_sent(&digest, &artifact.name);
                    return DeliveryOutcome::Sent { attempts: attempt };
                }
                Ok(response) if response.is_server_error() => {
                    tracing::warn!(
                        attempt,
                        status = response.status,
                        "server error sending {}: {}",
                        artifact.name,
                        response.body
                    );
                    last_error = format!("HTTP {}: {}", response.status, response.body);
                }
                Ok(response) => {
                    tracing::error!(
                        attempt,
                        status = response.status,
                        "endpoint rejected {}: {}",
                        artifact.name,
                        response.body
                    );
                    return DeliveryOutcome::Failed {
                        attempts: attempt,
                        reason: format!("HTTP {}: {}", response.status, response.body),
                    };
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt, "transport error sending {}: {}", artifact.name, e);
                    last_error = e.to_string();
                }
                Err(e) => {
                    tracing::error!(attempt, "cannot send {}: {}", artifact.name, e);
                    return DeliveryOutcome::Failed {
                        attempts: attempt,
                        reason: e.to_string(),
                    };
                }
            }
        }

        tracing::error!(
            "giving up on {} after {} attempts: {}",
            artifact.name,
            max_attempts,
            last_error
        );
        DeliveryOutcome::Failed {
            attempts: max_attempts,
            reason: last_error,
        }
    }
}
