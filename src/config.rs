//! Configuration management for snow-sheets.
//!
//! The configuration file is a YAML document with a `shared` defaults block,
//! a `profiles` mapping of named overrides and a `default_profile` key. The
//! active configuration is the deep merge of `shared` with the selected
//! profile, deserialized into a typed [`JobConfig`].

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable that selects the active profile when none is passed explicitly.
pub const PROFILE_ENV_VAR: &str = "APP_PROFILE";

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Profile used when neither the caller, the environment nor the document names one.
const FALLBACK_PROFILE: &str = "test";

/// A parsed, not yet resolved, configuration document.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    root: Mapping,
    source: String,
}

/// The merged configuration for one profile.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Name of the profile that was merged over `shared`.
    pub profile: String,

    /// The merged mapping, before typing.
    pub values: Mapping,
}

impl ConfigDocument {
    /// Loads a configuration document from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::io(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        Self::parse(&content, &path.display().to_string())
    }

    /// Parses a configuration document from a YAML string.
    ///
    /// `source` is only used in error messages.
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let value: YamlValue = serde_yaml::from_str(content).map_err(|e| {
            AppError::config(format!("Configuration error in {source}:\n  {e}"))
        })?;

        let root = match value {
            YamlValue::Mapping(map) => map,
            YamlValue::Null => Mapping::new(),
            _ => {
                return Err(AppError::config(format!(
                    "Configuration error in {source}: top level must be a mapping"
                )))
            }
        };

        Ok(Self {
            root,
            source: source.to_string(),
        })
    }

    /// Returns the `default_profile` declared by the document, if any.
    pub fn default_profile(&self) -> Option<&str> {
        self.root.get("default_profile").and_then(YamlValue::as_str)
    }

    /// Picks the profile name: explicit argument, then environment override,
    /// then the document default, then `"test"`. Empty strings count as unset.
    pub fn select_profile(&self, explicit: Option<&str>, env: Option<&str>) -> String {
        explicit
            .filter(|p| !p.is_empty())
            .or_else(|| env.filter(|p| !p.is_empty()))
            .or_else(|| self.default_profile().filter(|p| !p.is_empty()))
            .unwrap_or(FALLBACK_PROFILE)
            .to_string()
    }

    /// Merges `shared` with the selected profile.
    pub fn resolve(&self, explicit: Option<&str>, env: Option<&str>) -> Result<ResolvedConfig> {
        let profile = self.select_profile(explicit, env);

        let profiles = match self.root.get("profiles") {
            Some(YamlValue::Mapping(map)) => map,
            _ => {
                return Err(AppError::config(format!(
                    "Profile '{profile}' not found in {}",
                    self.source
                )))
            }
        };

        let overrides = profiles.get(profile.as_str()).ok_or_else(|| {
            AppError::config(format!(
                "Profile '{profile}' not found in {}",
                self.source
            ))
        })?;
        let overrides = as_block(overrides, &format!("profiles.{profile}"))?;

        let shared = match self.root.get("shared") {
            Some(value) => as_block(value, "shared")?,
            None => Mapping::new(),
        };

        let values = deep_merge(&shared, &overrides);
        debug!("Merged {} top-level keys for profile '{}'", values.len(), profile);
        info!("Active profile: {}", profile);

        Ok(ResolvedConfig { profile, values })
    }
}

/// Treats a null block as empty and rejects anything that is not a mapping.
fn as_block(value: &YamlValue, name: &str) -> Result<Mapping> {
    match value {
        YamlValue::Mapping(map) => Ok(map.clone()),
        YamlValue::Null => Ok(Mapping::new()),
        _ => Err(AppError::config(format!("'{name}' must be a mapping"))),
    }
}

/// Deep-merges `b` over `a`.
///
/// For each key in `b`: when both sides hold a mapping the two are merged
/// recursively, otherwise `b`'s value replaces `a`'s entirely. Lists are
/// never concatenated.
pub fn deep_merge(a: &Mapping, b: &Mapping) -> Mapping {
    let mut out = a.clone();
    for (key, value) in b {
        let merged = match (out.get(key), value) {
            (Some(YamlValue::Mapping(left)), YamlValue::Mapping(right)) => {
                YamlValue::Mapping(deep_merge(left, right))
            }
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

impl ResolvedConfig {
    /// Deserializes the merged mapping into the typed job configuration.
    pub fn job_config(&self) -> Result<JobConfig> {
        serde_yaml::from_value(YamlValue::Mapping(self.values.clone())).map_err(|e| {
            AppError::config(format!("Invalid configuration for profile '{}': {e}", self.profile))
        })
    }
}

/// Typed view of a resolved profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Spreadsheet destination settings.
    pub google: GoogleConfig,

    /// Warehouse settings.
    pub snowflake: SnowflakeConfig,

    /// Queries to run, in order.
    pub queries: Vec<QuerySpec>,

    /// Optional alerting hook.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// What to do when writing a result to the sheet fails.
    #[serde(default)]
    pub on_sink_error: SinkErrorPolicy,
}

/// Google Sheets settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Path to the service-account key file.
    pub service_account_json: PathBuf,

    /// Full URL of the target spreadsheet.
    pub sheet_url: String,
}

/// Snowflake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    /// Path to the JSON credential file.
    pub service_account_json: PathBuf,

    /// Prompt for an MFA passcode before each login attempt.
    #[serde(default)]
    pub require_passcode: bool,
}

/// Alerting settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Chat webhook that receives a message when a sheet write fails.
    pub webhook_url: Option<String>,
}

/// Policy applied when a sheet write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkErrorPolicy {
    /// Log the failure and move on to the next query.
    #[default]
    Continue,
    /// Stop the run with a sheet error.
    Abort,
}

/// One query to run and where its result goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Path to the SQL file.
    pub file: PathBuf,

    /// Target tab name.
    pub worksheet: String,

    /// Target A1 range; the tab's origin when absent.
    #[serde(default)]
    pub range: Option<String>,

    /// Text that replaces the statement terminator.
    #[serde(default)]
    pub cond: Option<String>,

    /// Values for `{name}` placeholders in the SQL file.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,

    /// Clear the target range (or the whole tab) before writing.
    #[serde(default)]
    pub clear: bool,
}

/// A scalar substitution parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
