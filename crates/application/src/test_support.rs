use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokenrelay_core::{AppError, AppResult, ProjectId};
use tokenrelay_domain::TokenSpec;
use tokio::sync::Mutex;

use crate::rotation_ports::{
    IssuedSecret, PlatformGroup, PlatformProject, SecretIssuer, SourceControlPlatform,
};

/// Issuer returning `secret-<call number>`, failing on selected call numbers.
#[derive(Default)]
pub struct FakeSecretIssuer {
    failing_calls: HashSet<usize>,
    calls: Mutex<Vec<TokenSpec>>,
}

impl FakeSecretIssuer {
    pub fn failing_calls(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_calls: calls.into_iter().collect(),
            calls: Mutex::default(),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn received_token_specs(&self) -> Vec<TokenSpec> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl SecretIssuer for FakeSecretIssuer {
    async fn issue_secret(&self, token_spec: &TokenSpec) -> AppResult<IssuedSecret> {
        let mut calls = self.calls.lock().await;
        calls.push(token_spec.clone());
        let call_number = calls.len();

        if self.failing_calls.contains(&call_number) {
            return Err(AppError::Unavailable("vault is sealed".to_owned()));
        }

        Ok(IssuedSecret::new(format!("secret-{call_number}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableWrite {
    Update {
        project_id: ProjectId,
        key: String,
        value: String,
    },
    Create {
        project_id: ProjectId,
        key: String,
        value: String,
    },
}

impl VariableWrite {
    pub fn update(project_id: i64, key: &str, value: &str) -> Self {
        Self::Update {
            project_id: ProjectId::new(project_id),
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }

    pub fn create(project_id: i64, key: &str, value: &str) -> Self {
        Self::Create {
            project_id: ProjectId::new(project_id),
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// In-memory platform where updates fail until a variable exists.
#[derive(Default)]
pub struct FakePlatform {
    groups: Vec<PlatformGroup>,
    projects: HashMap<i64, Vec<PlatformProject>>,
    failing_group: Mutex<Option<i64>>,
    fail_group_listing: Mutex<bool>,
    reject_creates: Mutex<bool>,
    variables: Mutex<HashMap<(ProjectId, String), String>>,
    writes: Mutex<Vec<VariableWrite>>,
    project_listings: Mutex<usize>,
}

impl FakePlatform {
    pub fn with_project(mut self, group_id: i64, project_id: i64, path: &str) -> Self {
        let group_path = path.split('/').next().unwrap_or_default().to_owned();
        if !self.groups.iter().any(|group| group.id == group_id) {
            self.groups.push(PlatformGroup {
                id: group_id,
                full_path: group_path,
            });
        }

        self.projects
            .entry(group_id)
            .or_default()
            .push(PlatformProject {
                id: ProjectId::new(project_id),
                path_with_namespace: path.to_owned(),
            });
        self
    }

    pub async fn fail_projects_for_group(&self, group_id: Option<i64>) {
        *self.failing_group.lock().await = group_id;
    }

    pub async fn fail_group_listing(&self, fail: bool) {
        *self.fail_group_listing.lock().await = fail;
    }

    pub async fn reject_creates(&self) {
        *self.reject_creates.lock().await = true;
    }

    pub async fn seed_variable(&self, project_id: ProjectId, key: &str, value: &str) {
        self.variables
            .lock()
            .await
            .insert((project_id, key.to_owned()), value.to_owned());
    }

    pub async fn variable(&self, project_id: ProjectId, key: &str) -> Option<String> {
        self.variables
            .lock()
            .await
            .get(&(project_id, key.to_owned()))
            .cloned()
    }

    pub async fn writes(&self) -> Vec<VariableWrite> {
        self.writes.lock().await.clone()
    }

    pub async fn project_listing_count(&self) -> usize {
        *self.project_listings.lock().await
    }
}

#[async_trait]
impl SourceControlPlatform for FakePlatform {
    async fn list_groups(&self) -> AppResult<Vec<PlatformGroup>> {
        if *self.fail_group_listing.lock().await {
            return Err(AppError::Unavailable("gitlab returned 502".to_owned()));
        }

        Ok(self.groups.clone())
    }

    async fn list_projects(&self, group: &PlatformGroup) -> AppResult<Vec<PlatformProject>> {
        *self.project_listings.lock().await += 1;

        if *self.failing_group.lock().await == Some(group.id) {
            return Err(AppError::Unavailable(format!(
                "listing projects of group {} timed out",
                group.id
            )));
        }

        Ok(self.projects.get(&group.id).cloned().unwrap_or_default())
    }

    async fn update_variable(
        &self,
        project_id: ProjectId,
        key: &str,
        value: &str,
    ) -> AppResult<()> {
        self.writes.lock().await.push(VariableWrite::Update {
            project_id,
            key: key.to_owned(),
            value: value.to_owned(),
        });

        let mut variables = self.variables.lock().await;
        match variables.get_mut(&(project_id, key.to_owned())) {
            Some(current) => {
                value.clone_into(current);
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "variable '{key}' not found in project {project_id}"
            ))),
        }
    }

    async fn create_variable(
        &self,
        project_id: ProjectId,
        key: &str,
        value: &str,
    ) -> AppResult<()> {
        self.writes.lock().await.push(VariableWrite::Create {
            project_id,
            key: key.to_owned(),
            value: value.to_owned(),
        });

        if *self.reject_creates.lock().await {
            return Err(AppError::Unavailable("gitlab returned 503".to_owned()));
        }

        self.variables
            .lock()
            .await
            .insert((project_id, key.to_owned()), value.to_owned());
        Ok(())
    }
}
