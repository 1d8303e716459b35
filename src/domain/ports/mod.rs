mod artifact_source;
mod cache_tier;
mod clock;
mod delivery_transport;
mod record_store;

pub use artifact_source::{ArtifactSource, StagedArtifact};
pub use cache_tier::CacheTier;
pub use clock::Clock;
pub use delivery_transport::{DeliveryTransport, TransportResponse};
pub use record_store::{EqualityFilter, RecordField, RecordStore};
