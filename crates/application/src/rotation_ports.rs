//! Ports for the two external collaborators of credential rotation.

use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use tokenrelay_core::{AppResult, ProjectId};
use tokenrelay_domain::TokenSpec;

/// Secret value minted by the issuer.
///
/// `Debug` output is redacted so the value never reaches logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedSecret(String);

impl IssuedSecret {
    /// Wraps a freshly minted secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw secret value for writing to the platform.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for IssuedSecret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("IssuedSecret(<redacted>)")
    }
}

/// Port for the secret-management backend.
#[async_trait]
pub trait SecretIssuer: Send + Sync {
    /// Mints one secret, forwarding the issuance parameters unexamined.
    async fn issue_secret(&self, token_spec: &TokenSpec) -> AppResult<IssuedSecret>;
}

/// Group known to the source-control platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformGroup {
    /// Platform group identifier.
    pub id: i64,
    /// Full namespaced group path.
    pub full_path: String,
}

/// Project known to the source-control platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProject {
    /// Platform project identifier.
    pub id: ProjectId,
    /// Namespaced path in `<group>/<project>` form.
    pub path_with_namespace: String,
}

/// Port for the source-control platform hosting the CI variables.
#[async_trait]
pub trait SourceControlPlatform: Send + Sync {
    /// Lists every group visible to the configured credentials.
    async fn list_groups(&self) -> AppResult<Vec<PlatformGroup>>;

    /// Lists the projects of one group.
    async fn list_projects(&self, group: &PlatformGroup) -> AppResult<Vec<PlatformProject>>;

    /// Overwrites an existing CI variable.
    async fn update_variable(&self, project_id: ProjectId, key: &str, value: &str)
    -> AppResult<()>;

    /// Creates a CI variable that does not exist yet.
    async fn create_variable(&self, project_id: ProjectId, key: &str, value: &str)
    -> AppResult<()>;
}
