use crate::domain::models::TaskListSummary;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1/";
const PAGE_SIZE: &str = "100";

/// Task resource as returned by the service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl GoogleTask {
    /// Parses `due` (RFC 3339, e.g. `2024-11-11T00:00:00.000Z`) into a UTC
    /// instant.
    pub fn due_at(&self) -> Result<Option<DateTime<Utc>>, InfraError> {
        let Some(raw) = self.due.as_deref().map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(raw)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|error| InfraError::RemoteService(format!("invalid due timestamp {raw:?}: {error}")))
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("(untitled)")
    }
}

/// Insertion payload. Only client-owned fields exist here, so server-assigned
/// ones (id, etag, selfLink, position, updated) can never be resubmitted.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq, Default)]
pub struct NewTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

#[async_trait]
pub trait GoogleTasksClient: Send + Sync {
    async fn list_task_lists(&self, access_token: &str) -> Result<Vec<TaskListSummary>, InfraError>;

    async fn list_tasks(&self, access_token: &str, list_id: &str) -> Result<Vec<GoogleTask>, InfraError>;

    async fn get_task(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<GoogleTask, InfraError>;

    async fn insert_task(
        &self,
        access_token: &str,
        list_id: &str,
        task: &NewTask,
    ) -> Result<GoogleTask, InfraError>;

    async fn delete_task(&self, access_token: &str, list_id: &str, task_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleTasksClient {
    client: Client,
    base_url: Url,
}

impl Default for ReqwestGoogleTasksClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, serde::Deserialize)]
struct PageResponse<T> {
    items: Option<Vec<T>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct TaskListItem {
    id: String,
    title: Option<String>,
}

impl ReqwestGoogleTasksClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: Url::parse(TASKS_API_BASE).expect("static tasks api base url"),
        }
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, InfraError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid tasks api base url: {error}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error_message(status: StatusCode, body: &str) -> String {
        if body.trim().is_empty() {
            format!("google tasks api error: http {}", status.as_u16())
        } else {
            format!("google tasks api error: http {}; body={body}", status.as_u16())
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("tasks api base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn tasks_endpoint(&self, list_id: &str) -> Result<Url, InfraError> {
        self.endpoint(&["lists", list_id, "tasks"])
    }

    fn task_endpoint(&self, list_id: &str, task_id: &str) -> Result<Url, InfraError> {
        self.endpoint(&["lists", list_id, "tasks", task_id])
    }

    async fn execute(request: RequestBuilder, action: &str) -> Result<(StatusCode, String), String> {
        let response = request
            .send()
            .await
            .map_err(|error| format!("network error while {action}: {error}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| format!("failed reading response while {action}: {error}"))?;
        Ok((status, body))
    }

    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        access_token: &str,
        endpoint: Url,
        action: &str,
    ) -> Result<Vec<T>, InfraError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(page_token) = page_token.as_deref() {
                request = request.query(&[("pageToken", page_token)]);
            }

            let (status, body) = Self::execute(request, action)
                .await
                .map_err(InfraError::RemoteService)?;
            if !status.is_success() {
                return Err(InfraError::RemoteService(Self::http_error_message(status, &body)));
            }

            let mut parsed: PageResponse<T> = serde_json::from_str(&body).map_err(|error| {
                InfraError::RemoteService(format!("invalid payload while {action}: {error}; body={body}"))
            })?;
            items.extend(parsed.items.take().unwrap_or_default());

            match parsed.next_page_token.take().filter(|token| !token.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl GoogleTasksClient for ReqwestGoogleTasksClient {
    async fn list_task_lists(&self, access_token: &str) -> Result<Vec<TaskListSummary>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["users", "@me", "lists"])?;
        let items: Vec<TaskListItem> = self
            .get_all_pages(access_token, endpoint, "listing task lists")
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.trim();
                if id.is_empty() {
                    return None;
                }
                let title = item
                    .title
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| id.to_string());
                Some(TaskListSummary {
                    id: id.to_string(),
                    title,
                })
            })
            .collect())
    }

    async fn list_tasks(&self, access_token: &str, list_id: &str) -> Result<Vec<GoogleTask>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(list_id, "task list id")?;

        let endpoint = self.tasks_endpoint(list_id)?;
        self.get_all_pages(access_token, endpoint, "listing tasks").await
    }

    async fn get_task(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<GoogleTask, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(list_id, "task list id")?;
        Self::ensure_non_empty(task_id, "task id")?;

        let endpoint = self.task_endpoint(list_id, task_id)?;
        let request = self.client.get(endpoint).bearer_auth(access_token);
        let (status, body) = Self::execute(request, "fetching task")
            .await
            .map_err(InfraError::RemoteService)?;

        if status == StatusCode::NOT_FOUND {
            return Err(InfraError::TaskNotFound {
                list_id: list_id.to_string(),
                task_id: task_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(InfraError::RemoteService(Self::http_error_message(status, &body)));
        }

        serde_json::from_str(&body).map_err(|error| {
            InfraError::RemoteService(format!("invalid task payload: {error}; body={body}"))
        })
    }

    async fn insert_task(
        &self,
        access_token: &str,
        list_id: &str,
        task: &NewTask,
    ) -> Result<GoogleTask, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(list_id, "task list id")?;

        let insertion_error = |message: String| InfraError::Insertion {
            list_id: list_id.to_string(),
            message,
        };

        let endpoint = self.tasks_endpoint(list_id)?;
        let request = self.client.post(endpoint).bearer_auth(access_token).json(task);
        let (status, body) = Self::execute(request, "inserting task")
            .await
            .map_err(insertion_error)?;

        if !status.is_success() {
            return Err(insertion_error(Self::http_error_message(status, &body)));
        }

        let created: GoogleTask = serde_json::from_str(&body)
            .map_err(|error| insertion_error(format!("invalid task payload: {error}; body={body}")))?;
        if created.id.as_deref().map(str::trim).filter(|id| !id.is_empty()).is_none() {
            return Err(insertion_error("insert response did not include id".to_string()));
        }
        Ok(created)
    }

    async fn delete_task(&self, access_token: &str, list_id: &str, task_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(list_id, "task list id")?;
        Self::ensure_non_empty(task_id, "task id")?;

        let deletion_error = |message: String| InfraError::Deletion {
            list_id: list_id.to_string(),
            task_id: task_id.to_string(),
            message,
            duplicated_as: None,
        };

        let endpoint = self.task_endpoint(list_id, task_id)?;
        let request = self.client.delete(endpoint).bearer_auth(access_token);
        let (status, body) = Self::execute(request, "deleting task")
            .await
            .map_err(deletion_error)?;

        if !status.is_success() {
            return Err(deletion_error(Self::http_error_message(status, &body)));
        }
        Ok(())
    }
}
