//! Exclusion and stripping rules
//!
//! The rule tables are plain data. `FilterRules` starts from the built-in
//! tables and can be extended from the `[filters]` section of the config file;
//! entries are only ever added, never removed.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;

use crate::api::{AttributeMetadata, ManyToManyRelationshipMetadata, OneToManyRelationshipMetadata};

/// System entities whose metadata and relationships are never written
pub const SYSTEM_ENTITIES: &[&str] = &[
    "sharepointdocument",
    "sharepointdocumentlocation",
    "activitypointer",
    "activityparty",
    "listmember",
    "socialactivity",
    "socialprofile",
    "syncerror",
    "bulkoperationlog",
    "slakpiinstance",
    "userentityinstancedata",
    "entitlement",
    "bookableresource",
    "annotation",
    "bulkdeletefailure",
    "customerrelationship",
    "duplicaterecord",
    "asyncoperation",
    "processsession",
    "postrole",
    "postregarding",
    "postfollow",
    "mailboxtrackingfolder",
    "connection",
    "customeropportunityrole",
    "principalobjectattributeaccess",
    "imagedescriptor",
    "sla",
    "equipment",
    "subscription",
];

/// Attribute name prefixes of audit and system columns
pub const IGNORED_ATTRIBUTE_PREFIXES: &[&str] = &[
    "createdon",
    "createdby",
    "createdbyexternalparty",
    "modifiedon",
    "modifiedby",
    "modifiedonbehalfby",
    "overriddencreatedon",
    "ownerid",
    "utcconversiontimezonecode",
    "yominame",
    "versionnumber",
    "importsequencenumber",
    "masterid",
    "merged",
    "timezoneruleversionnumber",
    "traversedpath",
    "stageid",
    "processid",
    "participatesinworkflow",
    "businessunitid",
    "owningteam",
    "owninguser",
    "ms_traceid",
    "yomi",
    "utcoffeset",
];

/// Attribute name suffixes of derived columns (base currency, rollup date and state)
pub const IGNORED_ATTRIBUTE_SUFFIXES: &[&str] = &["_base", "_date", "_state"];

/// Element names removed from every written document, at any depth
pub const STRIPPED_ELEMENTS: &[&str] = &[
    "UserLocalizedLabel",
    "IsAuditEnabled",
    "MetadataId",
    "ColumnNumber",
    "IsGlobalFilterEnabled",
    "IsManaged",
    "IsRenameable",
    "IsRetrievable",
    "IsSearchable",
    "IsSecured",
    "IsSortableEnabled",
    "IsValidForAdvancedFind",
    "IsValidForCreate",
    "IsValidForRead",
    "IsValidForUpdate",
    "CanBeSecuredForCreate",
    "CanBeSecuredForRead",
    "CanBeSecuredForUpdate",
    "CanModifyAdditionalSettings",
    "IsCustomizable",
    "IntroducedVersion",
    "DeprecatedVersion",
    "HasChanged",
];

/// Polymorphic activity link, never schema-meaningful
pub const REGARDING_ATTRIBUTE: &str = "regardingobjectid";

/// Extra rule entries from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterAdditions {
    pub ignored_entities: Vec<String>,
    pub ignored_prefixes: Vec<String>,
    pub ignored_suffixes: Vec<String>,
    pub stripped_elements: Vec<String>,
}

/// Why an item was left out of the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Deprecated,
    Logical,
    IgnoredAttribute(String),
    SystemEntity(String),
    RegardingObject,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deprecated => write!(f, "deprecated"),
            Self::Logical => write!(f, "logical attribute"),
            Self::IgnoredAttribute(name) => write!(f, "ignored attribute '{}'", name),
            Self::SystemEntity(name) => write!(f, "system entity '{}'", name),
            Self::RegardingObject => write!(f, "polymorphic {}", REGARDING_ATTRIBUTE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterRules {
    ignored_entities: BTreeSet<String>,
    ignored_prefixes: Vec<String>,
    ignored_suffixes: Vec<String>,
    stripped_elements: BTreeSet<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            ignored_entities: SYSTEM_ENTITIES.iter().map(|s| s.to_string()).collect(),
            ignored_prefixes: IGNORED_ATTRIBUTE_PREFIXES.iter().map(|s| s.to_string()).collect(),
            ignored_suffixes: IGNORED_ATTRIBUTE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            stripped_elements: STRIPPED_ELEMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FilterRules {
    /// Built-in tables plus the configured additions
    pub fn with_additions(additions: &FilterAdditions) -> Self {
        let mut rules = Self::default();
        rules.ignored_entities.extend(additions.ignored_entities.iter().cloned());
        for prefix in &additions.ignored_prefixes {
            if !rules.ignored_prefixes.contains(prefix) {
                rules.ignored_prefixes.push(prefix.clone());
            }
        }
        for suffix in &additions.ignored_suffixes {
            if !rules.ignored_suffixes.contains(suffix) {
                rules.ignored_suffixes.push(suffix.clone());
            }
        }
        rules.stripped_elements.extend(additions.stripped_elements.iter().cloned());
        rules
    }

    pub fn is_entity_ignored(&self, logical_name: &str) -> bool {
        self.ignored_entities.contains(logical_name)
    }

    /// Case-sensitive prefix/suffix match against the system attribute tables
    pub fn is_attribute_ignored(&self, logical_name: &str) -> bool {
        self.ignored_prefixes.iter().any(|p| logical_name.starts_with(p.as_str()))
            || self.ignored_suffixes.iter().any(|s| logical_name.ends_with(s.as_str()))
    }

    pub fn stripped_elements(&self) -> &BTreeSet<String> {
        &self.stripped_elements
    }

    pub fn attribute_skip_reason(&self, attribute: &AttributeMetadata) -> Option<SkipReason> {
        if attribute.is_deprecated() {
            Some(SkipReason::Deprecated)
        } else if attribute.is_logical {
            Some(SkipReason::Logical)
        } else if self.is_attribute_ignored(&attribute.logical_name) {
            Some(SkipReason::IgnoredAttribute(attribute.logical_name.clone()))
        } else {
            None
        }
    }

    /// Rules for an entity's many-to-one side of a one-to-many relationship
    pub fn many_to_one_skip_reason(
        &self,
        relationship: &OneToManyRelationshipMetadata,
    ) -> Option<SkipReason> {
        if relationship.referencing_attribute == REGARDING_ATTRIBUTE {
            return Some(SkipReason::RegardingObject);
        }

        [&relationship.referencing_entity, &relationship.referenced_entity]
            .into_iter()
            .find(|entity| self.is_entity_ignored(entity))
            .map(|entity| SkipReason::SystemEntity(entity.clone()))
            .or_else(|| {
                [&relationship.referencing_attribute, &relationship.referenced_attribute]
                    .into_iter()
                    .find(|attribute| self.is_attribute_ignored(attribute))
                    .map(|attribute| SkipReason::IgnoredAttribute(attribute.clone()))
            })
    }

    pub fn many_to_many_skip_reason(
        &self,
        relationship: &ManyToManyRelationshipMetadata,
    ) -> Option<SkipReason> {
        [&relationship.entity1_logical_name, &relationship.entity2_logical_name]
            .into_iter()
            .find(|entity| self.is_entity_ignored(entity))
            .map(|entity| SkipReason::SystemEntity(entity.clone()))
    }
}
