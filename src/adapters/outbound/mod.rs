mod chat_delivery_transport;
mod directory_artifact_source;
mod notion_record_store;
mod sqlite_cache_tier;

pub use chat_delivery_transport::{build_multipart, ChatConfig, ChatDeliveryTransport, MultipartBody};
pub use directory_artifact_source::DirectoryArtifactSource;
pub use notion_record_store::{NotionConfig, NotionRecordStore};
pub use sqlite_cache_tier::SqliteCacheTier;
