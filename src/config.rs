use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::credentials::AwsCredentials;
use crate::domain::{BucketPrefix, DEFAULT_BUCKET, Lister, SampleCount, Selection};
use crate::error::NaipError;

pub const DEFAULT_CONFIG_FILE: &str = "naip-fetch.json";
pub const DEFAULT_AWS_REGION: &str = "us-west-2";

pub const IMAGERY_ROOT_VAR: &str = "GEO_DATA_DIR";
pub const HOME_VAR: &str = "HOME";
pub const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";
pub const REGION_VAR: &str = "AWS_REGION";
pub const ENDPOINT_VAR: &str = "NAIP_FETCH_ENDPOINT_URL";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub selection: Option<SelectionEntry>,
    #[serde(default)]
    pub count: Option<SampleCount>,
    #[serde(default)]
    pub lister: Option<Lister>,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Selection as written in the config file, either compact or one field per segment.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SelectionEntry {
    Shorthand(String),
    Detailed(SelectionEntryObject),
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SelectionEntryObject {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub spectrum: Option<String>,
    #[serde(default)]
    pub grid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub bucket: String,
    pub selection: Selection,
    pub count: SampleCount,
    pub lister: Lister,
    pub aws_region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl ResolvedConfig {
    pub fn prefix(&self) -> BucketPrefix {
        BucketPrefix::new(&self.bucket, &self.selection)
    }

    pub fn apply(&mut self, overrides: DownloadOverrides) {
        if let Some(selection) = overrides.selection {
            self.selection = selection;
        }
        if let Some(count) = overrides.count {
            self.count = count;
        }
        if let Some(lister) = overrides.lister {
            self.lister = lister;
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            bucket: DEFAULT_BUCKET.to_string(),
            selection: Selection::default(),
            count: SampleCount::default(),
            lister: Lister::default(),
            aws_region: None,
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOverrides {
    pub selection: Option<Selection>,
    pub count: Option<SampleCount>,
    pub lister: Option<Lister>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, NaipError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| NaipError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| NaipError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, NaipError> {
        let defaults = Selection::default();
        let selection = match config.selection {
            None => defaults,
            Some(SelectionEntry::Shorthand(value)) => value.parse()?,
            Some(SelectionEntry::Detailed(obj)) => Selection::new(
                obj.region.as_deref().unwrap_or(defaults.region()),
                obj.year.as_deref().unwrap_or(defaults.year()),
                obj.resolution.as_deref().unwrap_or(defaults.resolution()),
                obj.spectrum.as_deref().unwrap_or(defaults.spectrum()),
                obj.grid.as_deref().unwrap_or(defaults.grid()),
            )?,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            bucket: config
                .bucket
                .filter(|bucket| !bucket.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            selection,
            count: config.count.unwrap_or_default(),
            lister: config.lister.unwrap_or_default(),
            aws_region: config.aws_region,
            endpoint_url: config.endpoint_url,
        })
    }
}

/// Process environment captured once at startup.
#[derive(Debug, Clone)]
pub struct Environment {
    pub imagery_root: Option<Utf8PathBuf>,
    pub home: Option<PathBuf>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub aws_region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());
        Self {
            imagery_root: get(IMAGERY_ROOT_VAR).map(Utf8PathBuf::from),
            home: get(HOME_VAR).map(PathBuf::from),
            access_key_id: get(ACCESS_KEY_VAR),
            secret_access_key: get(SECRET_KEY_VAR),
            session_token: get(SESSION_TOKEN_VAR),
            aws_region: get(REGION_VAR),
            endpoint_url: get(ENDPOINT_VAR),
        }
    }

    pub fn imagery_root(&self) -> Result<&Utf8PathBuf, NaipError> {
        self.imagery_root
            .as_ref()
            .ok_or_else(|| NaipError::MissingEnv(IMAGERY_ROOT_VAR.to_string()))
    }

    /// Explicit credentials when both key variables are set.
    pub fn credentials(&self) -> Option<AwsCredentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access), Some(secret)) => Some(AwsCredentials {
                access_key_id: access.clone(),
                secret_access_key: secret.clone(),
                session_token: self.session_token.clone(),
            }),
            _ => None,
        }
    }

    pub fn require_credentials(&self) -> Result<AwsCredentials, NaipError> {
        if self.access_key_id.is_none() {
            return Err(NaipError::MissingEnv(ACCESS_KEY_VAR.to_string()));
        }
        self.credentials()
            .ok_or_else(|| NaipError::MissingEnv(SECRET_KEY_VAR.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.bucket, DEFAULT_BUCKET);
        assert_eq!(resolved.selection, Selection::default());
        assert_eq!(resolved.count, SampleCount::Limit(1));
        assert_eq!(resolved.lister, Lister::Native);
    }

    #[test]
    fn environment_ignores_empty_values() {
        let env = Environment::from_lookup(|name| match name {
            IMAGERY_ROOT_VAR => Some("/data/geo".to_string()),
            ACCESS_KEY_VAR => Some(String::new()),
            _ => None,
        });
        assert_eq!(env.imagery_root().unwrap().as_str(), "/data/geo");
        assert!(env.access_key_id.is_none());
        assert!(env.credentials().is_none());
    }
}
