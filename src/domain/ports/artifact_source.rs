//! Artifact Source Port
//!
//! Where generated reports wait before delivery.

use crate::domain::entities::DeliveryArtifact;
use crate::error::Result;

/// An artifact together with the handle needed to discard it afterwards.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub handle: String,
    pub artifact: DeliveryArtifact,
}

pub trait ArtifactSource: Send + Sync {
    /// List staged artifacts in delivery order.
    fn list(&self) -> Result<Vec<StagedArtifact>>;

    /// Remove a delivered artifact.
    fn discard(&self, staged: &StagedArtifact) -> Result<()>;
}
