use std::path::Path;

use tokenrelay_core::{AppError, AppResult};
use tokenrelay_domain::{GlobalSpec, GlobalSpecInput};

/// Reads and validates the YAML policy file.
pub fn load_policy_file(path: &Path) -> AppResult<GlobalSpec> {
    let document = std::fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!(
            "failed to read policy file '{}': {error}",
            path.display()
        ))
    })?;

    parse_policy_document(document.as_str()).map_err(|error| match error {
        AppError::Validation(message) => {
            AppError::Validation(format!("policy file '{}': {message}", path.display()))
        }
        other => other,
    })
}

/// Parses a YAML policy document and merges it into an immutable tree.
pub fn parse_policy_document(document: &str) -> AppResult<GlobalSpec> {
    let input = serde_yaml::from_str::<GlobalSpecInput>(document)
        .map_err(|error| AppError::Validation(format!("invalid policy document: {error}")))?;

    GlobalSpec::new(input)
}
