//! Metadata parsing and models for Dynamics 365

pub mod models;

pub use models::{
    AttributeMetadata, AttributeTypeCode, EntityMetadata, ManyToManyRelationshipMetadata,
    OneToManyRelationshipMetadata, PropertyBag,
};

use serde::Deserialize;

use crate::error::{ExtractError, Result};

/// OData collection envelope returned by `EntityDefinitions`
#[derive(Debug, Deserialize)]
struct EntityDefinitionsResponse {
    value: Vec<EntityMetadata>,
}

/// Parse an `EntityDefinitions` response body into entity metadata
pub fn parse_entity_definitions(body: &str) -> Result<Vec<EntityMetadata>> {
    log::debug!("Parsing entity definitions, {} bytes", body.len());

    let response: EntityDefinitionsResponse = serde_json::from_str(body)
        .map_err(|e| ExtractError::service(format!("malformed metadata response: {}", e)))?;

    log::info!("Parsed metadata for {} entities", response.value.len());
    Ok(response.value)
}
