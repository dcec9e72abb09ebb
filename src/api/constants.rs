//! API Constants and Configuration for Dynamics 365 Web API

/// Dynamics 365 Web API version
pub const API_VERSION: &str = "v9.2";

/// Base API path for Dynamics 365
pub const API_BASE_PATH: &str = "/api/data";

/// Full API path with version
pub fn api_path() -> String {
    format!("{}/{}", API_BASE_PATH, API_VERSION)
}

/// Azure AD token endpoint, `{}` is the tenant
pub const TOKEN_ENDPOINT: &str = "https://login.microsoftonline.com/{}/oauth2/token";

/// Tenant used for password grants when none is configured
pub const DEFAULT_TENANT: &str = "common";

/// Locale the metadata labels are filtered to (English - United States)
pub const DEFAULT_LABEL_LANGUAGE: u32 = 1033;

/// Collections expanded on every entity definition
pub const ENTITY_EXPANSIONS: &[&str] = &[
    "Attributes",
    "OneToManyRelationships",
    "ManyToOneRelationships",
    "ManyToManyRelationships",
];

/// Standard headers for Dynamics 365 requests
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// OData version header
    pub const ODATA_VERSION: &str = "4.0";

    /// Ask for `@odata.type` and friends on every object
    pub const PREFER_INCLUDE_ANNOTATIONS: &str = "odata.include-annotations=\"*\"";

    /// Client supplied correlation id, echoed in the service's diagnostics
    pub const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";
}

/// Build the token endpoint for a tenant
pub fn token_endpoint(tenant: &str) -> String {
    TOKEN_ENDPOINT.replace("{}", tenant)
}

/// Build the WhoAmI function endpoint
pub fn whoami_endpoint(base_url: &str) -> String {
    format!("{}{}/WhoAmI", base_url, api_path())
}

/// Build the EntityDefinitions endpoint
pub fn entity_definitions_endpoint(base_url: &str) -> String {
    format!("{}{}/EntityDefinitions", base_url, api_path())
}
