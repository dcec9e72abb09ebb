//! Dynamics 365 metadata models
//!
//! Every model keeps the complete property bag the Web API returned, since the
//! extractor writes all of it out, and lifts only the handful of properties
//! the filters and the pipeline decide on.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Raw JSON object as returned by the Web API
pub type PropertyBag = Map<String, Value>;

/// Attribute data types in Dynamics 365 (`AttributeTypeCode`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeTypeCode {
    BigInt,
    Boolean,
    CalendarRules,
    Customer,
    DateTime,
    Decimal,
    Double,
    EntityName,
    Integer,
    Lookup,
    ManagedProperty,
    Memo,
    Money,
    Owner,
    PartyList,
    Picklist,
    State,
    Status,
    String,
    Uniqueidentifier,
    Virtual,
    Other(String),
}

impl From<&str> for AttributeTypeCode {
    fn from(value: &str) -> Self {
        match value {
            "BigInt" => Self::BigInt,
            "Boolean" => Self::Boolean,
            "CalendarRules" => Self::CalendarRules,
            "Customer" => Self::Customer,
            "DateTime" => Self::DateTime,
            "Decimal" => Self::Decimal,
            "Double" => Self::Double,
            "EntityName" => Self::EntityName,
            "Integer" => Self::Integer,
            "Lookup" => Self::Lookup,
            "ManagedProperty" => Self::ManagedProperty,
            "Memo" => Self::Memo,
            "Money" => Self::Money,
            "Owner" => Self::Owner,
            "PartyList" => Self::PartyList,
            "Picklist" => Self::Picklist,
            "State" => Self::State,
            "Status" => Self::Status,
            "String" => Self::String,
            "Uniqueidentifier" => Self::Uniqueidentifier,
            "Virtual" => Self::Virtual,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Read a required string property
fn required_str(bag: &PropertyBag, key: &str, kind: &str) -> Result<String, String> {
    bag.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("{} is missing '{}'", kind, key))
}

/// Read an array property; null or absent reads as empty
fn collection<T>(bag: &PropertyBag, key: &str) -> Result<Vec<T>, String>
where
    T: TryFrom<PropertyBag, Error = String>,
{
    match bag.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => T::try_from(map.clone()),
                other => Err(format!("'{}' contains a non-object item: {}", key, other)),
            })
            .collect(),
        Some(other) => Err(format!("'{}' is not an array: {}", key, other)),
    }
}

/// Description of one field of an entity
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PropertyBag")]
pub struct AttributeMetadata {
    pub logical_name: String,
    pub attribute_type: Option<AttributeTypeCode>,
    pub deprecated_version: Option<String>,
    pub is_logical: bool,
    properties: PropertyBag,
}

impl AttributeMetadata {
    pub fn is_lookup(&self) -> bool {
        self.attribute_type == Some(AttributeTypeCode::Lookup)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated_version.is_some()
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }
}

impl TryFrom<PropertyBag> for AttributeMetadata {
    type Error = String;

    fn try_from(properties: PropertyBag) -> Result<Self, Self::Error> {
        Ok(Self {
            logical_name: required_str(&properties, "LogicalName", "attribute")?,
            attribute_type: properties
                .get("AttributeType")
                .and_then(Value::as_str)
                .map(AttributeTypeCode::from),
            deprecated_version: properties
                .get("DeprecatedVersion")
                .and_then(Value::as_str)
                .map(str::to_string),
            is_logical: properties
                .get("IsLogical")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            properties,
        })
    }
}

/// One-to-many (and, seen from the other side, many-to-one) relationship
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PropertyBag")]
pub struct OneToManyRelationshipMetadata {
    pub schema_name: String,
    pub referenced_entity: String,
    pub referenced_attribute: String,
    pub referencing_entity: String,
    pub referencing_attribute: String,
    properties: PropertyBag,
}

impl OneToManyRelationshipMetadata {
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }
}

impl TryFrom<PropertyBag> for OneToManyRelationshipMetadata {
    type Error = String;

    fn try_from(properties: PropertyBag) -> Result<Self, Self::Error> {
        const KIND: &str = "one-to-many relationship";
        Ok(Self {
            schema_name: required_str(&properties, "SchemaName", KIND)?,
            referenced_entity: required_str(&properties, "ReferencedEntity", KIND)?,
            referenced_attribute: required_str(&properties, "ReferencedAttribute", KIND)?,
            referencing_entity: required_str(&properties, "ReferencingEntity", KIND)?,
            referencing_attribute: required_str(&properties, "ReferencingAttribute", KIND)?,
            properties,
        })
    }
}

/// Many-to-many relationship between two entities
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PropertyBag")]
pub struct ManyToManyRelationshipMetadata {
    pub schema_name: String,
    pub entity1_logical_name: String,
    pub entity2_logical_name: String,
    properties: PropertyBag,
}

impl ManyToManyRelationshipMetadata {
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }
}

impl TryFrom<PropertyBag> for ManyToManyRelationshipMetadata {
    type Error = String;

    fn try_from(properties: PropertyBag) -> Result<Self, Self::Error> {
        const KIND: &str = "many-to-many relationship";
        Ok(Self {
            schema_name: required_str(&properties, "SchemaName", KIND)?,
            entity1_logical_name: required_str(&properties, "Entity1LogicalName", KIND)?,
            entity2_logical_name: required_str(&properties, "Entity2LogicalName", KIND)?,
            properties,
        })
    }
}

/// Complete entity metadata as retrieved for extraction.
///
/// `OneToManyRelationships` is expanded by the query but not decoded: every
/// one-to-many relationship is written from its referencing entity's
/// many-to-one side.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PropertyBag")]
pub struct EntityMetadata {
    pub logical_name: String,
    pub attributes: Vec<AttributeMetadata>,
    pub many_to_one_relationships: Vec<OneToManyRelationshipMetadata>,
    pub many_to_many_relationships: Vec<ManyToManyRelationshipMetadata>,
}

impl TryFrom<PropertyBag> for EntityMetadata {
    type Error = String;

    fn try_from(properties: PropertyBag) -> Result<Self, Self::Error> {
        Ok(Self {
            logical_name: required_str(&properties, "LogicalName", "entity")?,
            attributes: collection(&properties, "Attributes")?,
            many_to_one_relationships: collection(&properties, "ManyToOneRelationships")?,
            many_to_many_relationships: collection(&properties, "ManyToManyRelationships")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_flags() {
        let attribute: AttributeMetadata = serde_json::from_value(json!({
            "@odata.type": "#Microsoft.Dynamics.CRM.LookupAttributeMetadata",
            "LogicalName": "primarycontactid",
            "AttributeType": "Lookup",
            "DeprecatedVersion": null,
            "IsLogical": false,
            "Targets": ["contact"]
        }))
        .unwrap();

        assert!(attribute.is_lookup());
        assert!(!attribute.is_deprecated());
        assert!(!attribute.is_logical);
        assert_eq!(attribute.properties().len(), 6);
    }

    #[test]
    fn test_unknown_attribute_type_is_kept() {
        let attribute: AttributeMetadata = serde_json::from_value(json!({
            "LogicalName": "x",
            "AttributeType": "FileType",
            "DeprecatedVersion": "9.0.0.0",
        }))
        .unwrap();

        assert_eq!(
            attribute.attribute_type,
            Some(AttributeTypeCode::Other("FileType".to_string()))
        );
        assert!(attribute.is_deprecated());
        assert!(!attribute.is_logical);
    }

    #[test]
    fn test_entity_null_collections_are_empty() {
        let entity: EntityMetadata = serde_json::from_value(json!({
            "LogicalName": "account",
            "Attributes": [{ "LogicalName": "name", "AttributeType": "String" }],
            "ManyToManyRelationships": null
        }))
        .unwrap();

        assert_eq!(entity.attributes.len(), 1);
        assert!(entity.many_to_one_relationships.is_empty());
        assert!(entity.many_to_many_relationships.is_empty());
    }

    #[test]
    fn test_one_to_many_collection_not_decoded() {
        let entity: EntityMetadata = serde_json::from_value(json!({
            "LogicalName": "account",
            "Attributes": [],
            "OneToManyRelationships": [{ "ReferencingEntity": "contact" }],
            "ManyToOneRelationships": []
        }))
        .unwrap();

        assert_eq!(entity.logical_name, "account");
        assert!(entity.many_to_one_relationships.is_empty());
    }

    #[test]
    fn test_relationship_requires_schema_name() {
        let result: Result<OneToManyRelationshipMetadata, _> = serde_json::from_value(json!({
            "ReferencedEntity": "account",
            "ReferencedAttribute": "accountid",
            "ReferencingEntity": "contact",
            "ReferencingAttribute": "primarycontactid"
        }));

        let err = result.unwrap_err().to_string();
        assert!(err.contains("SchemaName"));
    }
}
