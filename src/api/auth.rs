use log::{debug, info};
use serde::Deserialize;

use crate::error::{ExtractError, Result};

use super::connection::{ConnectionSettings, CredentialSet};
use super::constants;

/// Successful token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Azure AD error payload
#[derive(Debug, Deserialize)]
struct TokenError {
    error: Option<String>,
    error_description: Option<String>,
}

/// Form fields for the token request of a credential set
fn token_form<'a>(resource: &'a str, credentials: &'a CredentialSet) -> Vec<(&'static str, &'a str)> {
    match credentials {
        CredentialSet::UsernamePassword {
            username,
            password,
            client_id,
            client_secret,
            ..
        } => {
            let mut form = vec![
                ("grant_type", "password"),
                ("client_id", client_id.as_str()),
                ("username", username.as_str()),
                ("password", password.as_str()),
                ("resource", resource),
            ];
            if let Some(secret) = client_secret {
                form.push(("client_secret", secret.as_str()));
            }
            form
        }
        CredentialSet::ClientCredentials {
            client_id,
            client_secret,
            ..
        } => vec![
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("resource", resource),
        ],
    }
}

/// Obtain a bearer token for the organization in `settings`
pub async fn acquire_token(http_client: &reqwest::Client, settings: &ConnectionSettings) -> Result<String> {
    let token_url = constants::token_endpoint(settings.credentials.tenant());
    info!("Authenticating to {} via {}", settings.url, token_url);

    let response = http_client
        .post(&token_url)
        .form(&token_form(&settings.url, &settings.credentials))
        .send()
        .await
        .map_err(|e| ExtractError::Connection(format!("token request failed: {}", e)))?;

    let status = response.status();
    debug!("Token request status: {}", status);

    let body = response
        .text()
        .await
        .map_err(|e| ExtractError::Connection(format!("failed to read token response: {}", e)))?;

    if status.is_success() {
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractError::Connection(format!("invalid token response: {}", e)))?;
        match token.access_token {
            Some(access_token) if !access_token.is_empty() => {
                debug!("Access token obtained successfully");
                Ok(access_token)
            }
            _ => Err(ExtractError::Connection("no access token in response".to_string())),
        }
    } else {
        let message = serde_json::from_str::<TokenError>(&body)
            .ok()
            .and_then(|e| e.error_description.or(e.error))
            .unwrap_or(body);
        Err(ExtractError::Connection(format!(
            "authentication failed ({}): {}",
            status, message
        )))
    }
}
