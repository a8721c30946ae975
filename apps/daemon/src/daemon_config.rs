use std::env;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use tokenrelay_core::{AppError, AppResult};
use url::Url;

const DEFAULT_GITLAB_BASE_URL: &str = "https://gitlab.com/api/v4";
const DEFAULT_VAULT_ADDRESS: &str = "https://127.0.0.1:8200";
const LEGACY_CONFIG_PATH: &str = "VGL_CONFIG_PATH";

/// Process configuration read from the environment.
#[derive(Clone)]
pub struct DaemonConfig {
    pub policy_path: PathBuf,
    pub gitlab_base_url: String,
    pub gitlab_token: String,
    pub vault_address: String,
    pub vault_token: String,
    pub vault_namespace: Option<String>,
    pub vault_ca_cert: Option<PathBuf>,
    pub discovery_interval_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl DaemonConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            non_empty(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };
        let parse_u64 = |name: &str, default: u64| -> AppResult<u64> {
            let value = match non_empty(name) {
                Some(value) => value.parse::<u64>().map_err(|error| {
                    AppError::Validation(format!("invalid {name} value '{value}': {error}"))
                })?,
                None => default,
            };

            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }

            Ok(value)
        };

        let policy_path = non_empty("TOKENRELAY_CONFIG_PATH")
            .or_else(|| non_empty(LEGACY_CONFIG_PATH))
            .map(PathBuf::from)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "TOKENRELAY_CONFIG_PATH (or {LEGACY_CONFIG_PATH}) is required"
                ))
            })?;
        let gitlab_base_url = validated_url(
            "GITLAB_BASE_URL",
            non_empty("GITLAB_BASE_URL").unwrap_or_else(|| DEFAULT_GITLAB_BASE_URL.to_owned()),
        )?;
        let gitlab_token = required("GITLAB_TOKEN")?;
        let vault_address = validated_url(
            "VAULT_ADDR",
            non_empty("VAULT_ADDR").unwrap_or_else(|| DEFAULT_VAULT_ADDRESS.to_owned()),
        )?;
        let vault_token = required("VAULT_TOKEN")?;
        let vault_namespace = non_empty("VAULT_NAMESPACE");
        let vault_ca_cert = non_empty("VAULT_CACERT").map(PathBuf::from);
        let discovery_interval_seconds = parse_u64("TOKENRELAY_DISCOVERY_INTERVAL_SECONDS", 300)?;
        let http_timeout_seconds = parse_u64("TOKENRELAY_HTTP_TIMEOUT_SECONDS", 15)?;

        Ok(Self {
            policy_path,
            gitlab_base_url,
            gitlab_token,
            vault_address,
            vault_token,
            vault_namespace,
            vault_ca_cert,
            discovery_interval_seconds,
            http_timeout_seconds,
        })
    }
}

impl Debug for DaemonConfig {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DaemonConfig")
            .field("policy_path", &self.policy_path)
            .field("gitlab_base_url", &self.gitlab_base_url)
            .field("gitlab_token", &"<redacted>")
            .field("vault_address", &self.vault_address)
            .field("vault_token", &"<redacted>")
            .field("vault_namespace", &self.vault_namespace)
            .field("vault_ca_cert", &self.vault_ca_cert)
            .field("discovery_interval_seconds", &self.discovery_interval_seconds)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

fn validated_url(name: &str, value: String) -> AppResult<String> {
    let url = Url::parse(value.as_str())
        .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "{name} must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(value.trim_end_matches('/').to_owned())
}
