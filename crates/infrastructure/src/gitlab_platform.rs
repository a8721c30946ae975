use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokenrelay_application::{PlatformGroup, PlatformProject, SourceControlPlatform};
use tokenrelay_core::{AppError, AppResult, ProjectId};
use tracing::debug;
use url::Url;

use crate::http_response::{ensure_success, transport_error};

const PAGE_SIZE: u32 = 100;
const NEXT_PAGE_HEADER: &str = "x-next-page";

#[derive(Debug, Deserialize)]
struct GroupResponse {
    id: i64,
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    id: ProjectId,
    path_with_namespace: String,
}

#[derive(Serialize)]
struct CreateVariableRequest<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct UpdateVariableRequest<'a> {
    value: &'a str,
}

/// GitLab REST v4 adapter for group discovery and CI variable writes.
pub struct GitLabPlatform {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitLabPlatform {
    /// Creates a platform client for an API base such as `https://gitlab.com/api/v4`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        }
    }

    async fn get_all_pages<T>(&self, resource: &str) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1_u32;

        loop {
            let endpoint = format!("gitlab {resource} endpoint");
            let response = self
                .http_client
                .get(format!(
                    "{}{resource}?per_page={PAGE_SIZE}&page={page}",
                    self.base_url
                ))
                .header("PRIVATE-TOKEN", self.token.as_str())
                .send()
                .await
                .map_err(|error| transport_error(endpoint.as_str(), &error))?;
            let response = ensure_success(response, endpoint.as_str()).await?;
            let next_page = next_page(response.headers());

            let mut batch = response.json::<Vec<T>>().await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to parse {endpoint} response body: {error}"
                ))
            })?;
            items.append(&mut batch);

            match next_page {
                Some(next) if next > page => {
                    debug!(resource, page = next, "fetching next gitlab page");
                    page = next;
                }
                _ => break,
            }
        }

        Ok(items)
    }

    fn variables_url(&self, project_id: ProjectId) -> String {
        format!("{}/projects/{project_id}/variables", self.base_url)
    }

    fn variable_url(&self, project_id: ProjectId, key: &str) -> AppResult<Url> {
        let mut url = Url::parse(self.variables_url(project_id).as_str()).map_err(|error| {
            AppError::Internal(format!("invalid gitlab variables url: {error}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| AppError::Internal("gitlab base url cannot carry a path".to_owned()))?
            .push(key);

        Ok(url)
    }
}

fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(NEXT_PAGE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u32>().ok())
}

#[async_trait]
impl SourceControlPlatform for GitLabPlatform {
    async fn list_groups(&self) -> AppResult<Vec<PlatformGroup>> {
        let groups = self.get_all_pages::<GroupResponse>("/groups").await?;

        Ok(groups
            .into_iter()
            .map(|group| PlatformGroup {
                id: group.id,
                full_path: group.full_path,
            })
            .collect())
    }

    async fn list_projects(&self, group: &PlatformGroup) -> AppResult<Vec<PlatformProject>> {
        let projects = self
            .get_all_pages::<ProjectResponse>(format!("/groups/{}/projects", group.id).as_str())
            .await?;

        Ok(projects
            .into_iter()
            .map(|project| PlatformProject {
                id: project.id,
                path_with_namespace: project.path_with_namespace,
            })
            .collect())
    }

    async fn update_variable(
        &self,
        project_id: ProjectId,
        key: &str,
        value: &str,
    ) -> AppResult<()> {
        let endpoint = "gitlab variable update endpoint";
        let response = self
            .http_client
            .put(self.variable_url(project_id, key)?)
            .header("PRIVATE-TOKEN", self.token.as_str())
            .json(&UpdateVariableRequest { value })
            .send()
            .await
            .map_err(|error| transport_error(endpoint, &error))?;

        ensure_success(response, endpoint).await?;
        Ok(())
    }

    async fn create_variable(
        &self,
        project_id: ProjectId,
        key: &str,
        value: &str,
    ) -> AppResult<()> {
        let endpoint = "gitlab variable create endpoint";
        let response = self
            .http_client
            .post(self.variables_url(project_id))
            .header("PRIVATE-TOKEN", self.token.as_str())
            .json(&CreateVariableRequest { key, value })
            .send()
            .await
            .map_err(|error| transport_error(endpoint, &error))?;

        ensure_success(response, endpoint).await?;
        Ok(())
    }
}
