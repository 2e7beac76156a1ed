//! Reads the OAuth client identity issued by the Google Cloud console.
//!
//! The console exports a JSON document with a single top-level key
//! (`installed` for desktop clients, `web` for web clients). Environment
//! variables override whatever the file provides.

use crate::infrastructure::config::{optional_lookup_value, required_lookup_value};
use crate::infrastructure::error::InfraError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const CLIENT_ID_KEYS: &[&str] = &["TASKSHIFT_GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_ID"];
const CLIENT_SECRET_KEYS: &[&str] = &["TASKSHIFT_GOOGLE_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

fn parse_client_secrets_file(raw: &str, path: &Path) -> Result<ClientSecretsEntry, InfraError> {
    let parsed: ClientSecretsFile = serde_json::from_str(raw)?;
    parsed.installed.or(parsed.web).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "{} has neither an \"installed\" nor a \"web\" section",
            path.display()
        ))
    })
}

pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets, InfraError> {
    load_client_secrets_with_lookup(path, |key| std::env::var(key).ok())
}

pub fn load_client_secrets_with_lookup<F>(path: &Path, lookup: F) -> Result<ClientSecrets, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let entry = if path.exists() {
        Some(parse_client_secrets_file(&fs::read_to_string(path)?, path)?)
    } else {
        None
    };

    let from_file = |select: fn(&ClientSecretsEntry) -> Option<&String>| {
        entry
            .as_ref()
            .and_then(select)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let file_client_id = from_file(|entry| entry.client_id.as_ref());
    let file_client_secret = from_file(|entry| entry.client_secret.as_ref());

    let resolve = |keys: &[&str], file_value: Option<String>, field: &str| match file_value {
        Some(file_value) => Ok(optional_lookup_value(&lookup, keys).unwrap_or(file_value)),
        None => required_lookup_value(
            &lookup,
            keys,
            &format!("google {field} (in {} or environment)", path.display()),
        ),
    };
    let client_id = resolve(CLIENT_ID_KEYS, file_client_id, "client id")?;
    let client_secret = resolve(CLIENT_SECRET_KEYS, file_client_secret, "client secret")?;

    Ok(ClientSecrets {
        client_id,
        client_secret,
        auth_uri: from_file(|entry| entry.auth_uri.as_ref()),
        token_uri: from_file(|entry| entry.token_uri.as_ref()),
    })
}
