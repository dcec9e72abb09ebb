//! Shared fixtures for the extraction tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use dyn365_schema::api::metadata::parse_entity_definitions;
use dyn365_schema::api::{EntityMetadata, MetadataService};
use dyn365_schema::{ExtractError, Result};
use serde_json::{Value, json};

/// In-memory metadata service returning the requested subset of `entities`
pub struct StaticMetadata {
    entities: Vec<EntityMetadata>,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl StaticMetadata {
    pub fn new(entities: Vec<EntityMetadata>) -> Self {
        Self {
            entities,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_response(body: &Value) -> Self {
        Self::new(parse_entity_definitions(&body.to_string()).unwrap())
    }
}

#[async_trait]
impl MetadataService for StaticMetadata {
    async fn fetch_metadata(&self, entity_names: &[String]) -> Result<Vec<EntityMetadata>> {
        self.requests.lock().unwrap().push(entity_names.to_vec());
        Ok(self
            .entities
            .iter()
            .filter(|entity| entity_names.contains(&entity.logical_name))
            .cloned()
            .collect())
    }
}

/// Service that always fails the way a throttled organization does
pub struct FailingService;

#[async_trait]
impl MetadataService for FailingService {
    async fn fetch_metadata(&self, _entity_names: &[String]) -> Result<Vec<EntityMetadata>> {
        Err(ExtractError::Service {
            status: Some(429),
            message: "Number of requests exceeded the limit".to_string(),
        })
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn label(text: &str) -> Value {
    json!({
        "LocalizedLabels": [{
            "Label": text,
            "LanguageCode": 1033,
            "IsManaged": true,
            "MetadataId": "6e8f1c1a-0000-0000-0000-000000000001",
            "HasChanged": null
        }],
        "UserLocalizedLabel": {
            "Label": text,
            "LanguageCode": 1033,
            "IsManaged": true,
            "MetadataId": "6e8f1c1a-0000-0000-0000-000000000001",
            "HasChanged": null
        }
    })
}

fn managed(value: bool) -> Value {
    json!({
        "Value": value,
        "CanBeChanged": true,
        "ManagedPropertyLogicalName": "canmodifyauditsettings"
    })
}

fn attribute(logical_name: &str, attribute_type: &str, display_name: &str) -> Value {
    json!({
        "@odata.type": format!("#Microsoft.Dynamics.CRM.{}AttributeMetadata", attribute_type),
        "LogicalName": logical_name,
        "SchemaName": logical_name,
        "AttributeType": attribute_type,
        "DisplayName": label(display_name),
        "Description": label(""),
        "IsLogical": false,
        "DeprecatedVersion": null,
        "IntroducedVersion": "5.0.0.0",
        "MetadataId": "0a1b2c3d-0000-0000-0000-000000000002",
        "HasChanged": null,
        "IsManaged": true,
        "IsAuditEnabled": managed(true),
        "IsValidForCreate": true,
        "IsValidForRead": true,
        "IsValidForUpdate": true,
        "ColumnNumber": 7,
        "RequiredLevel": {
            "Value": "None",
            "CanBeChanged": true,
            "ManagedPropertyLogicalName": "canmodifyrequirementlevelsettings"
        }
    })
}

pub fn lookup(logical_name: &str, display_name: &str, targets: &[&str]) -> Value {
    let mut value = attribute(logical_name, "Lookup", display_name);
    value["Targets"] = json!(targets);
    value
}

pub fn many_to_one(
    schema_name: &str,
    referencing_entity: &str,
    referencing_attribute: &str,
    referenced_entity: &str,
) -> Value {
    json!({
        "SchemaName": schema_name,
        "ReferencingEntity": referencing_entity,
        "ReferencingAttribute": referencing_attribute,
        "ReferencedEntity": referenced_entity,
        "ReferencedAttribute": format!("{}id", referenced_entity),
        "RelationshipType": "OneToManyRelationship",
        "SecurityTypes": "Append",
        "IsCustomRelationship": false,
        "IsManaged": true,
        "MetadataId": "9f8e7d6c-0000-0000-0000-000000000003",
        "IntroducedVersion": "5.0.0.0",
        "CascadeConfiguration": {
            "Assign": "NoCascade",
            "Delete": "RemoveLink",
            "Merge": "NoCascade"
        },
        "AssociatedMenuConfiguration": {
            "Behavior": "UseCollectionName",
            "Group": "Details",
            "Label": label(""),
            "Order": null
        }
    })
}

fn many_to_many(schema_name: &str, entity1: &str, entity2: &str) -> Value {
    json!({
        "SchemaName": schema_name,
        "Entity1LogicalName": entity1,
        "Entity2LogicalName": entity2,
        "Entity1IntersectAttribute": format!("{}id", entity1),
        "Entity2IntersectAttribute": format!("{}id", entity2),
        "IntersectEntityName": schema_name,
        "RelationshipType": "ManyToManyRelationship",
        "IsManaged": true,
        "MetadataId": "1d2c3b4a-0000-0000-0000-000000000004"
    })
}

/// `EntityDefinitions` response for account and contact
pub fn crm_response() -> Value {
    let mut address_composite = attribute("address1_composite", "Memo", "Address 1");
    address_composite["IsLogical"] = json!(true);
    let mut old_field = attribute("oldfield", "String", "Old Field");
    old_field["DeprecatedVersion"] = json!("9.0.0.0");
    let mut parent_customer = attribute("parentcustomerid", "Customer", "Company Name");
    parent_customer["Targets"] = json!(["account", "contact"]);
    let mut parent_contact = lookup("parentcontactid", "Parent Contact", &["contact"]);
    parent_contact["DeprecatedVersion"] = json!("9.0.0.0");

    json!({
        "@odata.context": "https://org.crm.dynamics.com/api/data/v9.2/$metadata#EntityDefinitions",
        "value": [
            {
                "LogicalName": "account",
                "MetadataId": "70816501-edb9-4740-a16c-6a5efbc05d84",
                "Attributes": [
                    attribute("accountid", "Uniqueidentifier", "Account"),
                    attribute("name", "String", "Account Name"),
                    attribute("ownerid", "Owner", "Owner"),
                    attribute("revenue", "Money", "Annual Revenue"),
                    attribute("revenue_base", "Money", "Annual Revenue (Base)"),
                    address_composite,
                    old_field,
                    lookup("primarycontactid", "Primary Contact", &["contact"]),
                    lookup("parentaccountid", "Parent Account", &["account"])
                ],
                "ManyToOneRelationships": [
                    many_to_one("account_primary_contact", "account", "primarycontactid", "contact"),
                    many_to_one("lk_accountbase_createdby", "account", "createdby", "systemuser"),
                    many_to_one("manualsla_account", "account", "slaid", "sla")
                ],
                "ManyToManyRelationships": [
                    many_to_many("accountleads_association", "account", "lead"),
                    many_to_many("listaccount_association", "account", "listmember")
                ]
            },
            {
                "LogicalName": "contact",
                "MetadataId": "608861bc-50a4-4c5f-a02c-21fe1943e2cf",
                "Attributes": [
                    attribute("contactid", "Uniqueidentifier", "Contact"),
                    attribute("fullname", "String", "Full Name"),
                    parent_customer,
                    lookup("preferredsystemuserid", "Preferred User", &["systemuser"]),
                    parent_contact,
                    attribute("modifiedon", "DateTime", "Modified On")
                ],
                "ManyToOneRelationships": [
                    many_to_one("contact_customer_accounts", "contact", "parentcustomerid", "account"),
                    many_to_one("contact_customer_contacts", "contact", "parentcustomerid", "contact"),
                    many_to_one("system_user_contacts", "contact", "preferredsystemuserid", "systemuser"),
                    many_to_one("contact_parent_contact", "contact", "parentcontactid", "contact"),
                    many_to_one("contact_regarding_account", "contact", "regardingobjectid", "account")
                ],
                "ManyToManyRelationships": null
            }
        ]
    })
}

/// Same response with the entity, attribute and relationship lists reversed
pub fn reversed(mut response: Value) -> Value {
    let entities = response["value"].as_array_mut().unwrap();
    entities.reverse();
    for entity in entities.iter_mut() {
        for collection in ["Attributes", "ManyToOneRelationships", "ManyToManyRelationships"] {
            if let Some(items) = entity[collection].as_array_mut() {
                items.reverse();
            }
        }
    }
    response
}

/// Every file below `root`, keyed by path relative to it
pub fn read_tree(root: &Path) -> BTreeMap<String, String> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                files.insert(relative, fs::read_to_string(&path).unwrap());
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}
