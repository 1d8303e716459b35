//! Delivery Transport Port
//!
//! Sends one artifact to the remote chat endpoint.

use crate::domain::entities::DeliveryArtifact;
use crate::domain::value_objects::IdempotencyKey;
use crate::error::Result;
use async_trait::async_trait;

/// Response of one transmission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Outbound port for the chat endpoint.
///
/// Returns `Err` only for transport-level faults (connection refused,
/// timeout); any HTTP status is returned as a `TransportResponse`.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(
        &self,
        artifact: &DeliveryArtifact,
        idempotency_key: &IdempotencyKey,
    ) -> Result<TransportResponse>;
}
