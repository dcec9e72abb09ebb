use async_trait::async_trait;

use crate::error::Result;

use super::metadata::EntityMetadata;

/// Source of entity metadata for the extractor.
///
/// `DynamicsClient` is the real implementation; tests drive the pipeline with
/// an in-memory one.
#[async_trait]
pub trait MetadataService {
    /// Retrieve attributes and all relationship collections for the named
    /// entities in a single query.
    async fn fetch_metadata(&self, entity_names: &[String]) -> Result<Vec<EntityMetadata>>;
}

#[async_trait]
impl<T: MetadataService + Sync + ?Sized> MetadataService for &T {
    async fn fetch_metadata(&self, entity_names: &[String]) -> Result<Vec<EntityMetadata>> {
        (**self).fetch_metadata(entity_names).await
    }
}
