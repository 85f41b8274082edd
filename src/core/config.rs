use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;

/// Name of the context whose settings apply to every other context.
pub const DEFAULT_CONTEXT: &str = "_";

/// Top-level opsbox.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Raw sync contexts. Kept untyped until a context is selected so the
    /// `_` defaults can be merged underneath first.
    #[serde(default)]
    pub sync: BTreeMap<String, Value>,
    /// Named table filters: filter name -> table patterns.
    #[serde(default)]
    pub mysql_backup_filter: BTreeMap<String, Vec<String>>,
    /// Credentials for the local restore client.
    #[serde(default)]
    pub local: MysqlCredentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncContext {
    #[serde(skip_deserializing, default)]
    pub name: String,
    #[serde(default)]
    pub ssh: Option<SshConfig>,
    #[serde(default)]
    pub container: Option<ContainerConfig>,
    #[serde(default)]
    pub mysql: Option<MysqlConfig>,
    #[serde(default)]
    pub mysqldump: Option<MysqldumpConfig>,
    #[serde(default)]
    pub rsync: Option<RsyncConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub hostname: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identity_file: Option<String>,
    /// Extra `-o` options, e.g. `ConnectTimeout=10`.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    pub name: String,
    #[serde(default = "default_runtime")]
    pub runtime: String,
}

fn default_runtime() -> String {
    "docker".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlCredentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlConfig {
    #[serde(flatten)]
    pub credentials: MysqlCredentials,
    /// Databases to sync: `name` or `local:foreign`.
    #[serde(default)]
    pub database: Vec<String>,
    /// Name of a `mysqlBackupFilter` entry.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqldumpConfig {
    /// Raw mysqldump options, passed through unescaped.
    #[serde(default)]
    pub option: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsyncConfig {
    /// rsync source, e.g. `deploy@web:/var/www/shop/`.
    pub path: String,
    #[serde(default)]
    pub directory: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A database pair from `mysql.database`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMapping {
    pub local: String,
    pub foreign: String,
}

impl DatabaseMapping {
    /// Parse `name` or `local:foreign`, trimming whitespace around each part.
    pub fn parse(entry: &str) -> Self {
        match entry.split_once(':') {
            Some((local, foreign)) => Self {
                local: local.trim().to_string(),
                foreign: foreign.trim().to_string(),
            },
            None => Self {
                local: entry.trim().to_string(),
                foreign: entry.trim().to_string(),
            },
        }
    }
}

impl MysqlConfig {
    pub fn databases(&self) -> Vec<DatabaseMapping> {
        self.database
            .iter()
            .map(|entry| DatabaseMapping::parse(entry))
            .collect()
    }
}

impl Config {
    /// Load from the default location (or `OPSBOX_CONFIG`).
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = io::read_file(path, "read config")?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::config_invalid_json(origin, e))
    }

    /// Resolve a named sync context with the `_` defaults merged underneath.
    pub fn context(&self, name: &str) -> Result<SyncContext> {
        if name.trim().is_empty() || name == DEFAULT_CONTEXT {
            return Err(Error::validation_invalid_argument(
                "context",
                format!("No valid configuration found for context \"{}\"", name),
            ));
        }

        let specific = self.sync.get(name).cloned().ok_or_else(|| {
            Error::config_missing_key(format!("sync.{}", name), None).with_hint(format!(
                "Available contexts: {}",
                self.context_names().join(", ")
            ))
        })?;

        let mut merged = self
            .sync
            .get(DEFAULT_CONTEXT)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        deep_merge(&mut merged, specific);

        let mut context: SyncContext = serde_json::from_value(merged).map_err(|e| {
            Error::config_invalid_value(format!("sync.{}", name), None, e.to_string())
        })?;
        context.name = name.to_string();
        Ok(context)
    }

    pub fn context_names(&self) -> Vec<String> {
        self.sync
            .keys()
            .filter(|name| name.as_str() != DEFAULT_CONTEXT)
            .cloned()
            .collect()
    }

    pub fn filter(&self, name: &str) -> Result<&[String]> {
        self.mysql_backup_filter
            .get(name)
            .filter(|patterns| !patterns.is_empty())
            .map(Vec::as_slice)
            .ok_or_else(|| {
                Error::config_missing_key(format!("mysqlBackupFilter.{}", name), None)
                    .with_hint(format!("MySQL dump filter \"{}\" is not available", name))
            })
    }
}

/// Objects merge key by key; any other value from `patch` replaces `base`.
fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_obj), Value::Object(patch_obj)) => {
            for (key, value) in patch_obj {
                if value.is_null() {
                    base_obj.remove(&key);
                } else {
                    deep_merge(base_obj.entry(key).or_insert(Value::Null), value);
                }
            }
        }
        (base, patch) => *base = patch,
    }
}
