use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_JSON: &str = "taskshift.json";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_TIMEZONE: &str = "Europe/Kyiv";
const DEFAULT_LOOKAHEAD_DAYS: i64 = 3;
const DEFAULT_CLIENT_SECRETS_FILE: &str = "credentials.json";
const DEFAULT_CONSENT_TIMEOUT_SECONDS: u64 = 300;
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub schema: u64,
    pub timezone: String,
    pub lookahead_days: i64,
    pub primary_list_id: Option<String>,
    pub client_secrets_file: String,
    pub credential_backend: CredentialBackend,
    pub scopes: Vec<String>,
    pub consent_port: u16,
    pub consent_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            timezone: DEFAULT_TIMEZONE.to_string(),
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            primary_list_id: None,
            client_secrets_file: DEFAULT_CLIENT_SECRETS_FILE.to_string(),
            credential_backend: CredentialBackend::File,
            scopes: vec![TASKS_SCOPE.to_string(), CALENDAR_SCOPE.to_string()],
            consent_port: 0,
            consent_timeout_seconds: DEFAULT_CONSENT_TIMEOUT_SECONDS,
        }
    }
}

impl AppConfig {
    pub fn time_zone(&self) -> Result<Tz, InfraError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("unknown timezone {:?}: {error}", self.timezone))
        })
    }

    pub fn lookahead(&self) -> Result<chrono::Duration, InfraError> {
        if self.lookahead_days < 0 {
            return Err(InfraError::InvalidConfig(
                "lookaheadDays must be >= 0".to_string(),
            ));
        }
        chrono::TimeDelta::try_days(self.lookahead_days).ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "lookaheadDays {} is out of range",
                self.lookahead_days
            ))
        })
    }

    /// Configured primary list, ignoring blank values.
    pub fn primary_list_id(&self) -> Option<&str> {
        self.primary_list_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn client_secrets_path(&self, config_dir: &Path) -> PathBuf {
        let configured = Path::new(self.client_secrets_file.trim());
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            config_dir.join(configured)
        }
    }
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(CONFIG_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(CONFIG_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }

    let config: AppConfig = serde_json::from_value(parsed)?;
    config.time_zone()?;
    config.lookahead()?;
    if config.scopes.iter().all(|scope| scope.trim().is_empty()) {
        return Err(InfraError::InvalidConfig(format!(
            "at least one scope is required in {}",
            path.display()
        )));
    }
    Ok(config)
}

pub fn required_lookup_value<F>(
    lookup: &F,
    keys: &[&str],
    field_name: &str,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

pub fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
