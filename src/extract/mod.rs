//! Schema extraction pipeline
//!
//! Turns the entity metadata returned by a [`MetadataService`] into one XML
//! file per attribute and relationship:
//!
//! ```text
//! <output>/dyn365-community-schema/<entity>/
//!     <attribute>.xml
//!     many-to-one/<relationship schema name>.xml
//!     many-to-many/<relationship schema name>.xml
//! ```
//!
//! Lookup attributes are not written on their own. They are held in a
//! per-entity index and folded into the many-to-one record of the
//! relationship that references them.

pub mod filters;
pub mod output;
pub mod xml;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_json::Value;

use crate::api::{
    AttributeMetadata, EntityMetadata, ManyToManyRelationshipMetadata, MetadataService,
    OneToManyRelationshipMetadata, PropertyBag,
};
use crate::error::{ExtractError, Result};

pub use filters::{FilterAdditions, FilterRules, SkipReason};

/// Folder created under the output folder to hold the schema tree
pub const SCHEMA_FOLDER: &str = "dyn365-community-schema";
pub const MANY_TO_ONE_FOLDER: &str = "many-to-one";
pub const MANY_TO_MANY_FOLDER: &str = "many-to-many";

const ATTRIBUTE_CONTRACT: &str = "AttributeMetadata";
const MANY_TO_ONE_CONTRACT: &str = "ManyToOneRelationship";
const MANY_TO_MANY_CONTRACT: &str = "ManyToManyRelationshipMetadata";

/// Lookup attributes of the entity being processed, by logical name
type LookupIndex<'a> = HashMap<&'a str, &'a AttributeMetadata>;

/// A many-to-one relationship paired with the lookup attribute behind it
#[derive(Debug, Clone, Copy)]
pub struct ManyToOneRelationship<'a> {
    pub lookup_attribute: Option<&'a AttributeMetadata>,
    pub relationship: &'a OneToManyRelationshipMetadata,
}

impl ManyToOneRelationship<'_> {
    /// Members of the serialized record
    pub fn members(&self) -> PropertyBag {
        let mut members = PropertyBag::new();
        members.insert(
            "LookupAttribute".to_string(),
            self.lookup_attribute
                .map_or(Value::Null, |a| Value::Object(a.properties().clone())),
        );
        members.insert(
            "Relationship".to_string(),
            Value::Object(self.relationship.properties().clone()),
        );
        members
    }
}

/// Counts of what a run wrote and left out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub entities: usize,
    pub attribute_files: usize,
    pub many_to_one_files: usize,
    pub many_to_many_files: usize,
    pub skipped_attributes: usize,
    pub skipped_relationships: usize,
    pub unreferenced_lookups: usize,
    /// Requested entities the service did not return
    pub missing_entities: Vec<String>,
}

impl ExtractSummary {
    pub fn files_written(&self) -> usize {
        self.attribute_files + self.many_to_one_files + self.many_to_many_files
    }
}

pub struct SchemaExtractor<S> {
    service: S,
    rules: FilterRules,
    output_root: PathBuf,
}

impl<S: MetadataService> SchemaExtractor<S> {
    /// Extractor writing below `<output_folder>/dyn365-community-schema`
    pub fn new(service: S, output_folder: impl AsRef<Path>) -> Self {
        Self {
            service,
            rules: FilterRules::default(),
            output_root: output_folder.as_ref().join(SCHEMA_FOLDER),
        }
    }

    pub fn with_rules(mut self, rules: FilterRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn rules(&self) -> &FilterRules {
        &self.rules
    }

    /// Retrieve metadata for `entity_names` and write the schema tree.
    ///
    /// Stops at the first error; files written before it stay on disk.
    pub async fn extract(&self, entity_names: &[String]) -> Result<ExtractSummary> {
        std::fs::create_dir_all(&self.output_root)
            .map_err(|e| ExtractError::filesystem(&self.output_root, e))?;

        let entities = self.service.fetch_metadata(entity_names).await?;
        info!("Retrieved metadata for {} entities", entities.len());

        let mut summary = ExtractSummary {
            missing_entities: entity_names
                .iter()
                .filter(|name| !entities.iter().any(|e| &e.logical_name == *name))
                .cloned()
                .collect(),
            ..Default::default()
        };
        for name in &summary.missing_entities {
            warn!("Entity '{}' was requested but not returned", name);
        }

        for entity in &entities {
            if self.rules.is_entity_ignored(&entity.logical_name) {
                warn!("Skipping system entity '{}'", entity.logical_name);
                continue;
            }
            self.extract_entity(entity, &mut summary)?;
        }

        info!(
            "Wrote {} files for {} entities into {}",
            summary.files_written(),
            summary.entities,
            self.output_root.display()
        );
        Ok(summary)
    }

    fn extract_entity(&self, entity: &EntityMetadata, summary: &mut ExtractSummary) -> Result<()> {
        let entity_folder = output::ensure_folder(&self.output_root, &entity.logical_name)?;
        let mut lookup_attributes = LookupIndex::new();

        for attribute in &entity.attributes {
            if let Some(reason) = self.rules.attribute_skip_reason(attribute) {
                debug!("{}.{}: skipped, {}", entity.logical_name, attribute.logical_name, reason);
                summary.skipped_attributes += 1;
                continue;
            }

            // Written as part of the many-to-one relationship instead
            if attribute.is_lookup() {
                lookup_attributes.insert(attribute.logical_name.as_str(), attribute);
                continue;
            }

            let path = output::xml_path(&entity_folder, &attribute.logical_name);
            self.write_document(ATTRIBUTE_CONTRACT, attribute.properties(), &path)?;
            summary.attribute_files += 1;
        }

        let many_to_one_folder = output::ensure_folder(&entity_folder, MANY_TO_ONE_FOLDER)?;
        let relationships: Vec<&OneToManyRelationshipMetadata> = entity
            .many_to_one_relationships
            .iter()
            .filter(|relationship| match self.rules.many_to_one_skip_reason(relationship) {
                Some(reason) => {
                    debug!("{}: skipped, {}", relationship.schema_name, reason);
                    summary.skipped_relationships += 1;
                    false
                }
                None => true,
            })
            .collect();

        let owners = lookup_owners(&relationships, &lookup_attributes);
        for relationship in relationships {
            let attribute = relationship.referencing_attribute.as_str();
            let record = ManyToOneRelationship {
                lookup_attribute: (owners.get(attribute) == Some(&relationship.schema_name.as_str()))
                    .then(|| lookup_attributes.get(attribute).copied())
                    .flatten(),
                relationship,
            };
            self.extract_many_to_one(&record, &many_to_one_folder, summary)?;
        }

        let many_to_many_folder = output::ensure_folder(&entity_folder, MANY_TO_MANY_FOLDER)?;
        for relationship in &entity.many_to_many_relationships {
            self.extract_many_to_many(relationship, &many_to_many_folder, summary)?;
        }

        for name in lookup_attributes.keys().filter(|name| !owners.contains_key(*name)) {
            debug!("{}.{}: lookup not referenced by any relationship, dropped", entity.logical_name, name);
            summary.unreferenced_lookups += 1;
        }
        summary.entities += 1;

        info!("Extracted entity '{}'", entity.logical_name);
        Ok(())
    }

    fn extract_many_to_one(
        &self,
        record: &ManyToOneRelationship<'_>,
        folder: &Path,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        let path = output::xml_path(folder, &record.relationship.schema_name);
        self.write_document(MANY_TO_ONE_CONTRACT, &record.members(), &path)?;
        summary.many_to_one_files += 1;
        Ok(())
    }

    fn extract_many_to_many(
        &self,
        relationship: &ManyToManyRelationshipMetadata,
        folder: &Path,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        if let Some(reason) = self.rules.many_to_many_skip_reason(relationship) {
            debug!("{}: skipped, {}", relationship.schema_name, reason);
            summary.skipped_relationships += 1;
            return Ok(());
        }

        let path = output::xml_path(folder, &relationship.schema_name);
        self.write_document(MANY_TO_MANY_CONTRACT, relationship.properties(), &path)?;
        summary.many_to_many_files += 1;
        Ok(())
    }

    /// Serialize, strip the noise elements and write
    fn write_document(&self, contract: &str, members: &PropertyBag, path: &Path) -> Result<()> {
        let xml = xml::to_contract_xml(contract, members)?;
        let stripped = xml::strip_elements(&xml, self.rules.stripped_elements())?;
        output::write_xml(&stripped, path)
    }
}

/// Pick, for every indexed lookup, the one relationship its metadata is folded into.
///
/// When several relationships reference the same lookup the lowest schema name
/// wins, so the choice does not depend on the order the service returned them.
fn lookup_owners<'a>(
    relationships: &[&'a OneToManyRelationshipMetadata],
    lookup_attributes: &LookupIndex<'_>,
) -> HashMap<&'a str, &'a str> {
    let mut owners: HashMap<&'a str, &'a str> = HashMap::new();
    for relationship in relationships {
        let attribute = relationship.referencing_attribute.as_str();
        if !lookup_attributes.contains_key(attribute) {
            continue;
        }
        let schema_name = relationship.schema_name.as_str();
        owners
            .entry(attribute)
            .and_modify(|owner| {
                if schema_name < *owner {
                    *owner = schema_name;
                }
            })
            .or_insert(schema_name);
    }
    owners
}
