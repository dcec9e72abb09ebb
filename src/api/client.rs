use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use crate::error::{ExtractError, Result};

use super::auth;
use super::connection::ConnectionSettings;
use super::constants::{self, headers};
use super::metadata::{self, EntityMetadata};
use super::service::MetadataService;

/// Response of the `WhoAmI` function
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WhoAmIResponse {
    user_id: Option<String>,
}

/// Authenticated Dynamics 365 Web API session
pub struct DynamicsClient {
    base_url: String,
    http_client: reqwest::Client,
    access_token: String,
    label_language: u32,
}

impl DynamicsClient {
    /// Build the HTTP client used for token and API requests
    fn build_http_client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(120))          // Full metadata for a few entities is large
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("dyn365-schema/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExtractError::Connection(format!("failed to build HTTP client: {}", e)))
    }

    pub fn new(base_url: String, access_token: String, http_client: reqwest::Client) -> Self {
        Self {
            base_url,
            http_client,
            access_token,
            label_language: constants::DEFAULT_LABEL_LANGUAGE,
        }
    }

    /// Restrict returned labels to another single locale
    pub fn with_label_language(mut self, label_language: u32) -> Self {
        self.label_language = label_language;
        self
    }

    /// Authenticate and confirm the session is usable with a `WhoAmI` call
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let http_client = Self::build_http_client()?;
        let access_token = auth::acquire_token(&http_client, settings).await?;
        let client = Self::new(settings.url.clone(), access_token, http_client);

        let user_id = client.who_am_i().await?;
        info!("Connected to {} as user {}", client.base_url, user_id);

        Ok(client)
    }

    /// Identity check, returns the calling user's id
    pub async fn who_am_i(&self) -> Result<String> {
        let url = constants::whoami_endpoint(&self.base_url);
        debug!("WhoAmI: {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", headers::CONTENT_TYPE_JSON)
            .header("OData-Version", headers::ODATA_VERSION)
            .header("OData-MaxVersion", headers::ODATA_VERSION)
            .send()
            .await
            .map_err(|e| ExtractError::Connection(format!("WhoAmI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExtractError::Connection(format!(
                "WhoAmI failed with status {}: {}",
                status, error_text
            )));
        }

        let whoami: WhoAmIResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Connection(format!("invalid WhoAmI response: {}", e)))?;

        whoami
            .user_id
            .ok_or_else(|| ExtractError::Connection("WhoAmI response has no UserId".to_string()))
    }

    /// Full URL of the single metadata query for `entity_names`
    pub fn metadata_url(&self, entity_names: &[String]) -> String {
        let filter = entity_names
            .iter()
            .map(|name| format!("LogicalName eq '{}'", name.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(" or ");

        format!(
            "{}?$select=LogicalName&$filter={}&$expand={}&LabelLanguages={}",
            constants::entity_definitions_endpoint(&self.base_url),
            urlencoding::encode(&filter),
            constants::ENTITY_EXPANSIONS.join(","),
            self.label_language
        )
    }

    /// Run the metadata query, no version stamp so the result is always a full snapshot
    pub async fn retrieve_metadata(&self, entity_names: &[String]) -> Result<Vec<EntityMetadata>> {
        let url = self.metadata_url(entity_names);
        let request_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Retrieving metadata for {} entities (request {})",
            entity_names.len(),
            request_id
        );
        debug!("Metadata query: {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", headers::CONTENT_TYPE_JSON)
            .header("OData-Version", headers::ODATA_VERSION)
            .header("OData-MaxVersion", headers::ODATA_VERSION)
            .header("Prefer", headers::PREFER_INCLUDE_ANNOTATIONS)
            .header(headers::CLIENT_REQUEST_ID, &request_id)
            .send()
            .await
            .map_err(|e| ExtractError::service(format!("metadata request failed: {}", e)))?;

        let status = response.status();
        debug!("Metadata response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| ExtractError::Service {
                status: Some(status.as_u16()),
                message: format!("failed to read metadata response: {}", e),
            })?;

        if !status.is_success() {
            return Err(ExtractError::Service {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        metadata::parse_entity_definitions(&body)
    }
}

#[async_trait]
impl MetadataService for DynamicsClient {
    async fn fetch_metadata(&self, entity_names: &[String]) -> Result<Vec<EntityMetadata>> {
        self.retrieve_metadata(entity_names).await
    }
}
