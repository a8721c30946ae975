use async_trait::async_trait;
use serde::Deserialize;
use tokenrelay_application::{IssuedSecret, SecretIssuer};
use tokenrelay_core::{AppError, AppResult};
use tokenrelay_domain::TokenSpec;
use tracing::debug;

use crate::http_response::{ensure_success, transport_error};

const TOKEN_CREATE_ENDPOINT: &str = "vault token create endpoint";

#[derive(Deserialize)]
struct TokenCreateResponse {
    auth: Option<TokenCreateAuth>,
}

#[derive(Deserialize)]
struct TokenCreateAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

/// Vault adapter minting child tokens through `auth/token/create`.
///
/// The token spec is sent as the request body exactly as configured, so it
/// uses Vault's own field names (`policies`, `ttl`, `renewable`, ...).
pub struct VaultTokenIssuer {
    http_client: reqwest::Client,
    address: String,
    token: String,
    namespace: Option<String>,
}

impl VaultTokenIssuer {
    /// Creates an issuer authenticating with the given parent token.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        address: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            address: address.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            namespace: None,
        }
    }

    /// Scopes every request to a Vault Enterprise namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[async_trait]
impl SecretIssuer for VaultTokenIssuer {
    async fn issue_secret(&self, token_spec: &TokenSpec) -> AppResult<IssuedSecret> {
        let endpoint = format!("{}/v1/auth/token/create", self.address);
        let mut request = self
            .http_client
            .post(endpoint)
            .header("X-Vault-Token", self.token.as_str())
            .json(token_spec);
        if let Some(namespace) = &self.namespace {
            request = request.header("X-Vault-Namespace", namespace.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|error| transport_error(TOKEN_CREATE_ENDPOINT, &error))?;
        let response = ensure_success(response, TOKEN_CREATE_ENDPOINT).await?;
        let body = response
            .text()
            .await
            .map_err(|error| transport_error(TOKEN_CREATE_ENDPOINT, &error))?;

        let auth = serde_json::from_str::<TokenCreateResponse>(body.as_str())
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to parse {TOKEN_CREATE_ENDPOINT} response body: {error}"
                ))
            })?
            .auth
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "{TOKEN_CREATE_ENDPOINT} response carried no auth section"
                ))
            })?;

        debug!(lease_seconds = auth.lease_duration, "vault token issued");
        Ok(IssuedSecret::new(auth.client_token))
    }
}
