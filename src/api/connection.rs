//! Connection string parsing
//!
//! Accepts the `Key=Value;Key=Value` strings used by the Dynamics 365 tooling
//! (`AuthType=OAuth;Url=https://org.crm.dynamics.com;Username=...`) and turns
//! them into a target URL plus the credentials needed to obtain a token.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ExtractError, Result};

use super::constants::DEFAULT_TENANT;

/// Credentials for one of the supported Azure AD grant flows
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSet {
    /// Resource owner password grant (`AuthType=OAuth` / `Office365`)
    UsernamePassword {
        username: String,
        password: String,
        client_id: String,
        client_secret: Option<String>,
        tenant: String,
    },
    /// Client credentials grant (`AuthType=ClientSecret`)
    ClientCredentials {
        client_id: String,
        client_secret: String,
        tenant: String,
    },
}

impl CredentialSet {
    pub fn tenant(&self) -> &str {
        match self {
            Self::UsernamePassword { tenant, .. } | Self::ClientCredentials { tenant, .. } => tenant,
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            Self::UsernamePassword { client_id, .. } | Self::ClientCredentials { client_id, .. } => {
                client_id
            }
        }
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword {
                username,
                client_id,
                tenant,
                ..
            } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("client_id", client_id)
                .field("tenant", tenant)
                .finish_non_exhaustive(),
            Self::ClientCredentials {
                client_id, tenant, ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .field("tenant", tenant)
                .finish(),
        }
    }
}

/// A parsed connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Organization URL without a trailing slash
    pub url: String,
    pub credentials: CredentialSet,
}

impl FromStr for ConnectionSettings {
    type Err = ExtractError;

    fn from_str(input: &str) -> Result<Self> {
        let pairs = parse_pairs(input)?;
        let lookup = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|key| pairs.get(*key))
                .filter(|value| !value.is_empty())
                .cloned()
        };
        let require = |keys: &[&str], what: &str| -> Result<String> {
            lookup(keys).ok_or_else(|| {
                ExtractError::Config(format!("connection string is missing {}", what))
            })
        };

        let url = require(&["url", "serviceuri", "server"], "Url")?
            .trim_end_matches('/')
            .to_string();

        let tenant = lookup(&["tenantid"]).or_else(|| {
            lookup(&["authority"]).and_then(|authority| tenant_from_authority(&authority))
        });

        let auth_type = lookup(&["authtype"]).unwrap_or_else(|| "OAuth".to_string());
        let credentials = match auth_type.to_ascii_lowercase().as_str() {
            "oauth" | "office365" => CredentialSet::UsernamePassword {
                username: require(&["username", "userid"], "Username")?,
                password: require(&["password"], "Password")?,
                client_id: require(&["clientid", "appid"], "ClientId")?,
                client_secret: lookup(&["clientsecret", "secret"]),
                tenant: tenant.unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            },
            "clientsecret" => CredentialSet::ClientCredentials {
                client_id: require(&["clientid", "appid"], "ClientId")?,
                client_secret: require(&["clientsecret", "secret"], "ClientSecret")?,
                tenant: tenant.ok_or_else(|| {
                    ExtractError::Config(
                        "AuthType=ClientSecret requires TenantId or Authority".to_string(),
                    )
                })?,
            },
            other => {
                return Err(ExtractError::Config(format!(
                    "unsupported AuthType '{}' (expected OAuth, Office365 or ClientSecret)",
                    other
                )));
            }
        };

        Ok(Self { url, credentials })
    }
}

/// Split a connection string into normalized keys and raw values.
///
/// Keys are lower-cased with whitespace removed, so `Service Uri` and
/// `serviceuri` land on the same entry. Values may be wrapped in single or
/// double quotes to carry `;`.
fn parse_pairs(input: &str) -> Result<HashMap<String, String>> {
    let mut pairs = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ';').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ';') {
            key.push(c);
        }
        let key: String = key
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        if chars.next() != Some('=') || key.is_empty() {
            return Err(ExtractError::Config(format!(
                "malformed connection string segment '{}', expected Key=Value",
                key
            )));
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let value = match chars.next_if(|c| *c == '\'' || *c == '"') {
            Some(quote) => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                        None => {
                            return Err(ExtractError::Config(format!(
                                "unterminated quoted value for '{}'",
                                key
                            )));
                        }
                    }
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                if chars.peek().is_some_and(|c| *c != ';') {
                    return Err(ExtractError::Config(format!(
                        "unexpected characters after quoted value for '{}'",
                        key
                    )));
                }
                value
            }
            None => {
                let mut value = String::new();
                while let Some(c) = chars.next_if(|c| *c != ';') {
                    value.push(c);
                }
                value.trim_end().to_string()
            }
        };

        pairs.insert(key, value);
    }

    Ok(pairs)
}

/// `https://login.microsoftonline.com/contoso.onmicrosoft.com` -> `contoso.onmicrosoft.com`
fn tenant_from_authority(authority: &str) -> Option<String> {
    let tenant = match authority.split_once("://") {
        Some((_, rest)) => rest.split('/').nth(1)?,
        None => authority.trim_matches('/'),
    };
    (!tenant.is_empty()).then(|| tenant.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oauth_connection_string() {
        let settings: ConnectionSettings = "AuthType=OAuth; Url=https://org.crm.dynamics.com/; \
             Username=jane@contoso.com; Password=hunter2; ClientId=51f81489-12ee-4a9e-aaae-a2591f45987d"
            .parse()
            .unwrap();

        assert_eq!(settings.url, "https://org.crm.dynamics.com");
        assert_eq!(
            settings.credentials,
            CredentialSet::UsernamePassword {
                username: "jane@contoso.com".to_string(),
                password: "hunter2".to_string(),
                client_id: "51f81489-12ee-4a9e-aaae-a2591f45987d".to_string(),
                client_secret: None,
                tenant: "common".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_client_secret_with_authority() {
        let settings: ConnectionSettings = "AuthType=ClientSecret;ServiceUri=https://org.crm4.dynamics.com;\
             AppId=abc;Secret='s3;cr=t';Authority=https://login.microsoftonline.com/contoso.onmicrosoft.com"
            .parse()
            .unwrap();

        assert_eq!(settings.url, "https://org.crm4.dynamics.com");
        assert_eq!(
            settings.credentials,
            CredentialSet::ClientCredentials {
                client_id: "abc".to_string(),
                client_secret: "s3;cr=t".to_string(),
                tenant: "contoso.onmicrosoft.com".to_string(),
            }
        );
    }

    #[test]
    fn test_keys_are_case_and_space_insensitive() {
        let settings: ConnectionSettings =
            "authtype=office365;Service Uri=https://x.crm.dynamics.com;User Name=u;PASSWORD=p;clientid=c;TenantId=t"
                .parse()
                .unwrap();

        assert_eq!(settings.url, "https://x.crm.dynamics.com");
        assert_eq!(settings.credentials.tenant(), "t");
        assert_eq!(settings.credentials.client_id(), "c");
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let err = "AuthType=OAuth;Username=u;Password=p;ClientId=c"
            .parse::<ConnectionSettings>()
            .unwrap_err();
        assert!(matches!(err, ExtractError::Config(ref msg) if msg.contains("Url")));
    }

    #[test]
    fn test_client_secret_requires_tenant() {
        let err = "AuthType=ClientSecret;Url=https://x;ClientId=c;ClientSecret=s"
            .parse::<ConnectionSettings>()
            .unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn test_unknown_auth_type_rejected() {
        let err = "AuthType=Certificate;Url=https://x;ClientId=c"
            .parse::<ConnectionSettings>()
            .unwrap_err();
        assert!(err.to_string().contains("Certificate"));
    }

    #[test]
    fn test_malformed_segment_rejected() {
        assert!("Url=https://x;justakey".parse::<ConnectionSettings>().is_err());
        assert!("Url='https://x".parse::<ConnectionSettings>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings: ConnectionSettings =
            "Url=https://x;Username=u;Password=topsecret;ClientId=c;ClientSecret=alsosecret"
                .parse()
                .unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("alsosecret"));
        assert!(debug.contains("<redacted>"));
    }
}
