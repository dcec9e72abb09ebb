//! Dynamics 365 Web API access
//!
//! Just enough of the Web API to authenticate from a connection string,
//! check the session with `WhoAmI` and pull entity definitions with their
//! attributes and relationships in one round trip.

pub mod auth;
pub mod client;
pub mod connection;
pub mod constants;
pub mod metadata;
pub mod service;

pub use client::DynamicsClient;
pub use connection::{ConnectionSettings, CredentialSet};
pub use metadata::{
    AttributeMetadata, AttributeTypeCode, EntityMetadata, ManyToManyRelationshipMetadata,
    OneToManyRelationshipMetadata, PropertyBag,
};
pub use service::MetadataService;
