//! Configuration resolution
//!
//! Every setting comes from the first of: command line flag, environment
//! (a `.env` file in the working directory is loaded first), the TOML config
//! file, the built-in default.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ConnectionSettings;
use crate::api::constants::DEFAULT_LABEL_LANGUAGE;
use crate::cli::{Cli, DEFAULT_ENTITIES};
use crate::error::ExtractError;
use crate::extract::{FilterAdditions, FilterRules};

/// Environment variable holding the connection string
pub const CONNECTION_STRING_ENV: &str = "DYN365_CONNECTION_STRING";

/// Contents of `config.toml`, every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub connection_string: Option<String>,
    pub output_folder: Option<PathBuf>,
    pub entities: Option<Vec<String>>,
    pub label_language: Option<u32>,
    pub filters: FilterAdditions,
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("dyn365-schema");
        Ok(config_dir.join("config.toml"))
    }

    /// Load `explicit` if given (it must exist), otherwise the default path if present
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = Self::get_config_path()?;
                if !path.exists() {
                    debug!("No config file at {:?}, using defaults", path);
                    return Ok(Self::default());
                }
                path
            }
        };

        debug!("Loading config from: {:?}", config_path);
        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Everything a run needs, fully resolved
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub connection: ConnectionSettings,
    pub output_folder: PathBuf,
    pub entities: Vec<String>,
    pub label_language: u32,
    pub rules: FilterRules,
}

impl ExtractOptions {
    /// Layer the command line, environment and config file; a missing
    /// connection string or an empty entity list is a configuration error
    pub fn resolve(
        cli: &Cli,
        config: &Config,
        env_connection_string: Option<String>,
    ) -> crate::error::Result<Self> {
        let connection_string = cli
            .connection_string
            .clone()
            .or(env_connection_string)
            .or_else(|| config.connection_string.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ExtractError::Config(format!(
                    "A connection string is required: pass --connection-string, set {} or add connection_string to the config file",
                    CONNECTION_STRING_ENV
                ))
            })?;
        let connection: ConnectionSettings = connection_string.parse()?;

        let output_folder = match cli.source_folder.clone().or_else(|| config.output_folder.clone()) {
            Some(folder) => folder,
            None => std::env::current_dir().map_err(|e| ExtractError::filesystem(".", e))?,
        };

        let entities = match (&cli.entities, &config.entities) {
            (Some(list), _) => parse_entity_list(list),
            (None, Some(configured)) => parse_entity_list(&configured.join(",")),
            (None, None) => parse_entity_list(DEFAULT_ENTITIES),
        };
        if entities.is_empty() {
            return Err(ExtractError::Config("The entity list is empty".to_string()));
        }

        let options = Self {
            connection,
            output_folder,
            entities,
            label_language: config.label_language.unwrap_or(DEFAULT_LABEL_LANGUAGE),
            rules: FilterRules::with_additions(&config.filters),
        };

        info!(
            "Extracting {:?} from {} into {}",
            options.entities,
            options.connection.url,
            options.output_folder.display()
        );
        Ok(options)
    }
}

/// Split a comma-separated list, trimming items and dropping empties and repeats
pub fn parse_entity_list(list: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if !entities.iter().any(|existing| existing == name) {
            entities.push(name.to_string());
        }
    }
    entities
}
