//! tokenrelay credential rotation daemon.

#![forbid(unsafe_code)]

mod daemon_config;

use std::sync::Arc;
use std::time::Duration;

use tokenrelay_application::RotationService;
use tokenrelay_core::{AppError, AppResult};
use tokenrelay_infrastructure::{GitLabPlatform, VaultTokenIssuer, load_policy_file};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::daemon_config::DaemonConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DaemonConfig::load()?;
    let policy = Arc::new(load_policy_file(config.policy_path.as_path())?);
    let http_client = build_http_client(&config)?;

    let platform = GitLabPlatform::new(
        http_client.clone(),
        config.gitlab_base_url.as_str(),
        config.gitlab_token.as_str(),
    );
    let mut secret_issuer = VaultTokenIssuer::new(
        http_client,
        config.vault_address.as_str(),
        config.vault_token.as_str(),
    );
    if let Some(namespace) = &config.vault_namespace {
        secret_issuer = secret_issuer.with_namespace(namespace.as_str());
    }

    let service = RotationService::new(policy.clone(), Arc::new(platform), Arc::new(secret_issuer));

    info!(
        policy_path = %config.policy_path.display(),
        gitlab_base_url = %config.gitlab_base_url,
        vault_address = %config.vault_address,
        vault_namespace = config.vault_namespace.as_deref().unwrap_or("-"),
        vault_ca_cert = config.vault_ca_cert.is_some(),
        configured_groups = policy.group_names().count(),
        discovery_interval_seconds = config.discovery_interval_seconds,
        "tokenrelay started"
    );

    tokio::select! {
        () = run_discovery_loop(&service, Duration::from_secs(config.discovery_interval_seconds)) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(error) = signal {
                warn!(error = %error, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        }
    }

    service.scheduler().shutdown().await;
    info!("tokenrelay stopped");
    Ok(())
}

fn build_http_client(config: &DaemonConfig) -> AppResult<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().timeout(Duration::from_secs(config.http_timeout_seconds));

    if let Some(path) = &config.vault_ca_cert {
        let pem = std::fs::read(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read VAULT_CACERT '{}': {error}",
                path.display()
            ))
        })?;
        let certificate = reqwest::Certificate::from_pem(pem.as_slice()).map_err(|error| {
            AppError::Validation(format!(
                "invalid VAULT_CACERT '{}': {error}",
                path.display()
            ))
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    builder
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))
}

async fn run_discovery_loop(service: &RotationService, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match service.run_discovery_tick().await {
            Ok(summary) => info!(
                groups_seen = summary.groups_seen,
                projects_seen = summary.projects_seen,
                disabled_skipped = summary.disabled_skipped,
                already_scheduled = summary.already_scheduled,
                newly_scheduled = summary.newly_scheduled,
                first_sync_failed = summary.first_sync_failed,
                "discovery tick completed"
            ),
            Err(error) => warn!(error = %error, "discovery tick failed"),
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::build_http_client;
    use crate::daemon_config::DaemonConfig;

    fn config(vault_ca_cert: Option<PathBuf>) -> DaemonConfig {
        DaemonConfig {
            policy_path: PathBuf::from("/etc/tokenrelay/policy.yaml"),
            gitlab_base_url: "https://gitlab.com/api/v4".to_owned(),
            gitlab_token: "glpat-secret".to_owned(),
            vault_address: "https://127.0.0.1:8200".to_owned(),
            vault_token: "hvs.parent".to_owned(),
            vault_namespace: None,
            vault_ca_cert,
            discovery_interval_seconds: 300,
            http_timeout_seconds: 15,
        }
    }

    #[test]
    fn client_builds_without_extra_ca() {
        assert!(build_http_client(&config(None)).is_ok());
    }

    #[test]
    fn unreadable_ca_certificate_names_the_path() {
        let path = PathBuf::from("/nonexistent/tokenrelay/vault-ca.pem");

        let message = match build_http_client(&config(Some(path))) {
            Ok(_) => panic!("missing CA file should be rejected"),
            Err(error) => error.to_string(),
        };
        assert!(message.contains("vault-ca.pem"));
    }
}
