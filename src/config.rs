use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

pub const DEFAULT_CONFIG_FILE: &str = "rb-publish.json";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const API_KEY_ENV: &str = "RB_PUBLISH_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepositoryVersion {
    Redbox1,
    #[default]
    Redbox2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Page,
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Sequential,
    #[default]
    Concurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePolicy {
    #[default]
    Measured,
    Declared,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub redbox: RepositoryEntry,
    #[serde(default)]
    pub logfile: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub render: Option<RenderMode>,
    #[serde(default)]
    pub fetch: Option<FetchMode>,
    #[serde(default)]
    pub size: Option<SizePolicy>,
    #[serde(default)]
    pub datacrate: Option<DataCrateEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RepositoryEntry {
    #[serde(default)]
    pub version: Option<RepositoryVersion>,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DataCrateEntry {
    #[serde(default)]
    pub organization: Option<Organisation>,
    #[serde(default)]
    pub catalog_json: Option<String>,
    #[serde(default)]
    pub catalog_html: Option<String>,
    #[serde(default)]
    pub datapub_json: Option<String>,
    #[serde(default)]
    pub zip_path: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub approver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Organisation {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub version: RepositoryVersion,
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DataCrateConfig {
    pub organisation: Option<Organisation>,
    pub catalog_json: String,
    pub catalog_html: String,
    pub datapub_json: Option<String>,
    pub zip_path: Option<String>,
    pub owner: String,
    pub approver: String,
}

impl Default for DataCrateConfig {
    fn default() -> Self {
        Self {
            organisation: None,
            catalog_json: "catalog.json".to_string(),
            catalog_html: "catalog.html".to_string(),
            datapub_json: None,
            zip_path: None,
            owner: "admin".to_string(),
            approver: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub repository: RepositoryConfig,
    pub logfile: Option<Utf8PathBuf>,
    pub output: Utf8PathBuf,
    pub template: Option<Utf8PathBuf>,
    pub render: RenderMode,
    pub fetch: FetchMode,
    pub size: SizePolicy,
    pub datacrate: DataCrateConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PublishError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            return Err(PublishError::MissingConfig(config_path));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PublishError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PublishError::ConfigParse(err.to_string()))?;

        let mut resolved = Self::resolve_config(config)?;
        if let Ok(api_key) = std::env::var(API_KEY_ENV) {
            if !api_key.trim().is_empty() {
                resolved.repository.api_key = Some(api_key.trim().to_string());
            }
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PublishError> {
        let base_url = config.redbox.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PublishError::ConfigParse(
                "redbox.baseURL must not be empty".to_string(),
            ));
        }

        let defaults = DataCrateConfig::default();
        let datacrate = match config.datacrate {
            Some(entry) => DataCrateConfig {
                organisation: entry.organization,
                catalog_json: entry.catalog_json.unwrap_or(defaults.catalog_json),
                catalog_html: entry.catalog_html.unwrap_or(defaults.catalog_html),
                datapub_json: entry.datapub_json,
                zip_path: entry.zip_path,
                owner: entry.owner.unwrap_or(defaults.owner),
                approver: entry.approver.unwrap_or(defaults.approver),
            },
            None => defaults,
        };

        Ok(ResolvedConfig {
            repository: RepositoryConfig {
                version: config.redbox.version.unwrap_or_default(),
                base_url,
                api_key: config.redbox.api_key.filter(|key| !key.trim().is_empty()),
            },
            logfile: config.logfile.map(Utf8PathBuf::from),
            output: Utf8PathBuf::from(config.output.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)),
            template: config.template.map(Utf8PathBuf::from),
            render: config.render.unwrap_or_default(),
            fetch: config.fetch.unwrap_or_default(),
            size: config.size.unwrap_or_default(),
            datacrate,
        })
    }
}
