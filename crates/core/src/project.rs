use std::fmt::{Display, Formatter};

use serde::Deserialize;

/// Platform-assigned numeric project identifier.
///
/// Unique within one source-control platform instance and stable for the
/// lifetime of the project, so it keys renewal registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(i64);

impl ProjectId {
    /// Creates a project identifier from the platform value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }
}

impl Display for ProjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
