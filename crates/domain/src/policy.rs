use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokenrelay_core::{AppError, AppResult, NonEmptyString};

const ROOT_LEVEL: &str = "default";

/// Issuance parameters forwarded verbatim to the secret issuer.
///
/// The content is never inspected here; it inherits as a whole unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSpec(Value);

impl TokenSpec {
    /// Wraps an issuer-specific parameter document.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw parameter document.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

const MIN_RENEW_PERIOD: Duration = Duration::from_secs(1);

/// Positive renewal interval parsed from a duration string such as `"1h30m"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewPeriod {
    source: String,
    duration: Duration,
}

impl RenewPeriod {
    /// Parses a duration string and rejects periods shorter than one second.
    pub fn parse(value: &str) -> AppResult<Self> {
        let source = value.trim();
        let duration = humantime::parse_duration(source).map_err(|error| {
            AppError::Validation(format!("invalid renewPeriod '{value}': {error}"))
        })?;

        if duration < MIN_RENEW_PERIOD {
            return Err(AppError::Validation(format!(
                "renewPeriod '{value}' must be at least 1s"
            )));
        }

        Ok(Self {
            source: source.to_owned(),
            duration,
        })
    }

    /// Returns the period as written in the policy document.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.source.as_str()
    }

    /// Returns the parsed interval.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Display for RenewPeriod {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.source.as_str())
    }
}

/// Repository targeting fields as written in the policy document.
///
/// Every field is optional; blank strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepoSpecInput {
    /// CI variable that receives the issued secret.
    pub build_key: Option<String>,
    /// Whether repositories under this level are managed at all.
    pub enabled: Option<bool>,
    /// Renewal interval, for example `"1h"` or `"30m"`.
    pub renew_period: Option<String>,
}

impl RepoSpecInput {
    fn build_key(&self) -> Option<&str> {
        non_blank(self.build_key.as_deref())
    }

    fn renew_period(&self) -> Option<&str> {
        non_blank(self.renew_period.as_deref())
    }

    fn into_root(self) -> AppResult<RepoSpec> {
        let build_key = self
            .build_key()
            .ok_or_else(|| missing_field("repositorySpec.buildKey"))?;
        let enabled = self
            .enabled
            .ok_or_else(|| missing_field("repositorySpec.enabled"))?;
        let renew_period = self
            .renew_period()
            .ok_or_else(|| missing_field("repositorySpec.renewPeriod"))?;

        Ok(RepoSpec {
            build_key: NonEmptyString::new(build_key)?,
            enabled,
            renew_period: RenewPeriod::parse(renew_period)
                .map_err(|error| at_level(ROOT_LEVEL, error))?,
        })
    }

    fn inherit_from(self, parent: &RepoSpec, level: &str) -> AppResult<RepoSpec> {
        let build_key = match self.build_key() {
            Some(build_key) => NonEmptyString::new(build_key)?,
            None => parent.build_key.clone(),
        };
        let renew_period = match self.renew_period() {
            Some(renew_period) => {
                RenewPeriod::parse(renew_period).map_err(|error| at_level(level, error))?
            }
            None => parent.renew_period.clone(),
        };

        Ok(RepoSpec {
            build_key,
            enabled: self.enabled.unwrap_or(parent.enabled),
            renew_period,
        })
    }
}

/// One policy level as written in the policy document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkSpecInput {
    /// Repository targeting fields.
    pub repository_spec: Option<RepoSpecInput>,
    /// Issuer parameters, inherited as a whole when absent.
    pub token_spec: Option<TokenSpec>,
}

impl LinkSpecInput {
    fn inherit_from(self, parent: &LinkSpec, level: &str) -> AppResult<LinkSpec> {
        let repository_spec = match self.repository_spec {
            Some(repository_spec) => repository_spec.inherit_from(&parent.repository_spec, level)?,
            None => parent.repository_spec.clone(),
        };

        Ok(LinkSpec {
            repository_spec,
            token_spec: self
                .token_spec
                .unwrap_or_else(|| parent.token_spec.clone()),
        })
    }
}

/// Group section as written in the policy document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpecInput {
    /// Group-wide defaults; absent means the global default applies as-is.
    pub default: Option<LinkSpecInput>,
    /// Per-project overrides keyed by project name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: BTreeMap<String, LinkSpecInput>,
}

/// Root of the policy document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSpecInput {
    /// Global defaults; every field is mandatory here.
    pub default: Option<LinkSpecInput>,
    /// Group sections keyed by group name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: BTreeMap<String, GroupSpecInput>,
}

/// Fully resolved repository targeting policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    build_key: NonEmptyString,
    enabled: bool,
    renew_period: RenewPeriod,
}

impl RepoSpec {
    /// Returns the CI variable name receiving the secret.
    #[must_use]
    pub fn build_key(&self) -> &NonEmptyString {
        &self.build_key
    }

    /// Returns whether matching repositories are managed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the renewal interval.
    #[must_use]
    pub fn renew_period(&self) -> &RenewPeriod {
        &self.renew_period
    }
}

/// Resolved pair of repository targeting and issuer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    repository_spec: RepoSpec,
    token_spec: TokenSpec,
}

impl LinkSpec {
    /// Returns the repository targeting policy.
    #[must_use]
    pub fn repository_spec(&self) -> &RepoSpec {
        &self.repository_spec
    }

    /// Returns the issuer parameters.
    #[must_use]
    pub fn token_spec(&self) -> &TokenSpec {
        &self.token_spec
    }
}

/// Group defaults and project overrides, already merged downward.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    default: LinkSpec,
    projects: BTreeMap<String, LinkSpec>,
}

impl GroupSpec {
    /// Returns the merged group default.
    #[must_use]
    pub fn default_link(&self) -> &LinkSpec {
        &self.default
    }

    /// Returns one merged project override.
    #[must_use]
    pub fn project(&self, project_name: &str) -> Option<&LinkSpec> {
        self.projects.get(project_name)
    }

    /// Returns the number of project overrides.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

/// Immutable, fully merged policy tree.
///
/// Built once at startup. Every level carries a complete [`LinkSpec`], so
/// lookups select a level and never merge.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSpec {
    default: LinkSpec,
    groups: BTreeMap<String, GroupSpec>,
}

impl GlobalSpec {
    /// Validates the global default and merges every group and project level.
    pub fn new(input: GlobalSpecInput) -> AppResult<Self> {
        let GlobalSpecInput { default, groups } = input;

        let default = default.ok_or_else(|| {
            AppError::Validation("the global default policy section is required".to_owned())
        })?;
        let repository_spec = default
            .repository_spec
            .ok_or_else(|| missing_field("repositorySpec"))?
            .into_root()?;
        let token_spec = default
            .token_spec
            .ok_or_else(|| missing_field("tokenSpec"))?;
        let default = LinkSpec {
            repository_spec,
            token_spec,
        };

        let groups = groups
            .into_iter()
            .map(|(group_name, group)| {
                let group = merge_group(&default, group_name.as_str(), group)?;
                Ok((group_name, group))
            })
            .collect::<AppResult<BTreeMap<_, _>>>()?;

        Ok(Self { default, groups })
    }

    /// Returns the effective policy for a `<group>/<project>` path.
    ///
    /// Only the first two segments participate; deeper nesting is ignored.
    #[must_use]
    pub fn resolve(&self, path: &str) -> &LinkSpec {
        let mut segments = path.split('/');
        let Some(group) = segments
            .next()
            .and_then(|group_name| self.groups.get(group_name))
        else {
            return &self.default;
        };

        segments
            .next()
            .and_then(|project_name| group.project(project_name))
            .unwrap_or(&group.default)
    }

    /// Returns the global default.
    #[must_use]
    pub fn default_link(&self) -> &LinkSpec {
        &self.default
    }

    /// Returns one merged group.
    #[must_use]
    pub fn group(&self, group_name: &str) -> Option<&GroupSpec> {
        self.groups.get(group_name)
    }

    /// Returns configured group names in sorted order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

fn merge_group(global: &LinkSpec, group_name: &str, input: GroupSpecInput) -> AppResult<GroupSpec> {
    let GroupSpecInput { default, projects } = input;

    let default = match default {
        Some(default) => {
            default.inherit_from(global, format!("groups.{group_name}.default").as_str())?
        }
        None => global.clone(),
    };

    let projects = projects
        .into_iter()
        .map(|(project_name, project)| {
            let level = format!("groups.{group_name}.projects.{project_name}");
            let project = project.inherit_from(&default, level.as_str())?;
            Ok((project_name, project))
        })
        .collect::<AppResult<BTreeMap<_, _>>>()?;

    Ok(GroupSpec { default, projects })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn missing_field(field: &str) -> AppError {
    AppError::Validation(format!(
        "{ROOT_LEVEL}.{field} is required in the global default policy"
    ))
}

fn at_level(level: &str, error: AppError) -> AppError {
    match error {
        AppError::Validation(message) => AppError::Validation(format!("{level}: {message}")),
        other => other,
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
