use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::scheduler::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Data directory for `local` storage.
    pub root: PathBuf,
    pub bucket: Option<String>,
    /// Key prefix inside the bucket, e.g. `data`.
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            root: PathBuf::from("data"),
            bucket: None,
            prefix: None,
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            delay_secs: 300,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            delay: Duration::from_secs(self.delay_secs),
        }
    }
}

/// Storage prefixes each feed is uploaded under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixConfig {
    pub airbnb: String,
    pub monthly: String,
    pub census: String,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            airbnb: "airbnb".to_string(),
            monthly: "airbnb".to_string(),
            census: "census".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BronzeConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub prefixes: PrefixConfig,
}

impl BronzeConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse bronze configuration")
    }

    /// Reads the optional TOML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(url) = get("DATABASE_URL").or_else(|| get("BRONZE_DATABASE_URL")) {
            self.database.url = Some(url);
        }

        if let Some(kind) = get("BRONZE_STORAGE_KIND") {
            self.storage.kind = match kind.to_ascii_lowercase().as_str() {
                "local" => StorageKind::Local,
                "s3" => StorageKind::S3,
                other => bail!("unknown BRONZE_STORAGE_KIND '{other}'"),
            };
        }
        if let Some(root) = get("BRONZE_DATA_ROOT") {
            self.storage.root = PathBuf::from(root);
        }

        let storage = &mut self.storage;
        for (key, slot) in [
            ("S3_BUCKET", &mut storage.bucket),
            ("S3_PREFIX", &mut storage.prefix),
            ("S3_REGION", &mut storage.region),
            ("S3_ENDPOINT_URL", &mut storage.endpoint),
            ("S3_ACCESS_KEY_ID", &mut storage.access_key_id),
            ("S3_SECRET_ACCESS_KEY", &mut storage.secret_access_key),
        ] {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }
        if let Some(flag) = get("S3_FORCE_PATH_STYLE") {
            storage.force_path_style = parse_flag(&flag)
                .with_context(|| format!("invalid S3_FORCE_PATH_STYLE '{flag}'"))?;
        }

        if let Some(retries) = get("BRONZE_RETRIES") {
            self.retry.retries = retries
                .parse()
                .with_context(|| format!("invalid BRONZE_RETRIES '{retries}'"))?;
        }
        if let Some(delay) = get("BRONZE_RETRY_DELAY_SECS") {
            self.retry.delay_secs = delay
                .parse()
                .with_context(|| format!("invalid BRONZE_RETRY_DELAY_SECS '{delay}'"))?;
        }

        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database
            .url
            .as_deref()
            .context("DATABASE_URL (or BRONZE_DATABASE_URL) must be set")
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_the_whole_task_retry_policy() {
        let config = BronzeConfig::default();
        assert_eq!(config.retry.retries, 2);
        assert_eq!(config.retry.policy().delay, Duration::from_secs(300));
        assert_eq!(config.prefixes.census, "census");
        assert_eq!(config.storage.kind, StorageKind::Local);
    }

    #[test]
    fn toml_sections_are_optional() {
        let config = BronzeConfig::from_toml_str(
            r#"
            [storage]
            kind = "s3"
            bucket = "bde-bucket"
            prefix = "data"

            [prefixes]
            monthly = "airbnb/monthly"
            "#,
        )
        .expect("parse config");

        assert_eq!(config.storage.kind, StorageKind::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("bde-bucket"));
        assert_eq!(config.prefixes.monthly, "airbnb/monthly");
        assert_eq!(config.prefixes.airbnb, "airbnb");
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BRONZE_DATABASE_URL", "postgres://localhost/bronze"),
            ("BRONZE_STORAGE_KIND", "S3"),
            ("S3_BUCKET", "override"),
            ("S3_FORCE_PATH_STYLE", "true"),
            ("BRONZE_RETRIES", "0"),
            ("BRONZE_RETRY_DELAY_SECS", ""),
        ]);

        let mut config = BronzeConfig::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .expect("apply env");

        assert_eq!(config.database_url().unwrap(), "postgres://localhost/bronze");
        assert_eq!(config.storage.kind, StorageKind::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("override"));
        assert!(config.storage.force_path_style);
        assert_eq!(config.retry.retries, 0);
        assert_eq!(config.retry.delay_secs, 300);
    }

    #[test]
    fn unknown_storage_kind_is_rejected() {
        let mut config = BronzeConfig::default();
        let result = config.apply_env(|key| (key == "BRONZE_STORAGE_KIND").then(|| "gcs".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(BronzeConfig::default().database_url().is_err());
    }
}
