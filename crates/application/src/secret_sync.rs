use tokenrelay_core::ProjectId;
use tokenrelay_domain::TokenSpec;
use tracing::{debug, info, warn};

use crate::rotation_ports::{SecretIssuer, SourceControlPlatform};

/// Result of one issue-and-write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Existing CI variable received the new secret.
    Updated,
    /// CI variable did not accept an update and was created instead.
    Created,
    /// Issuer failed; no write was attempted.
    IssueFailed,
    /// Both the update and the create path failed.
    WriteFailed,
}

impl SyncOutcome {
    /// Returns whether the platform now holds a fresh secret.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Updated | Self::Created)
    }
}

/// Issues one secret and writes it to one CI variable, creating it if needed.
///
/// Failures are logged and reported through [`SyncOutcome`]; the previous
/// variable value stays in place whenever issuance fails.
pub async fn sync_secret(
    platform: &dyn SourceControlPlatform,
    secret_issuer: &dyn SecretIssuer,
    project_id: ProjectId,
    build_key: &str,
    token_spec: &TokenSpec,
) -> SyncOutcome {
    let secret = match secret_issuer.issue_secret(token_spec).await {
        Ok(secret) => secret,
        Err(error) => {
            warn!(
                project_id = %project_id,
                build_key,
                error = %error,
                "failed to issue secret, previous CI variable value kept"
            );
            return SyncOutcome::IssueFailed;
        }
    };

    let update_error = match platform
        .update_variable(project_id, build_key, secret.expose())
        .await
    {
        Ok(()) => {
            info!(project_id = %project_id, build_key, "CI variable updated");
            return SyncOutcome::Updated;
        }
        Err(error) => error,
    };

    debug!(
        project_id = %project_id,
        build_key,
        error = %update_error,
        "CI variable update rejected, creating it"
    );

    match platform
        .create_variable(project_id, build_key, secret.expose())
        .await
    {
        Ok(()) => {
            info!(project_id = %project_id, build_key, "CI variable created");
            SyncOutcome::Created
        }
        Err(create_error) => {
            warn!(
                project_id = %project_id,
                build_key,
                update_error = %update_error,
                create_error = %create_error,
                "failed to write CI variable"
            );
            SyncOutcome::WriteFailed
        }
    }
}
