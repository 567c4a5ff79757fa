use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::task::{Task, TaskId, TaskPatch};

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub resource: String,
    pub limit: u32,
    pub user_id: u64,
    pub timeout: Option<Duration>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            resource: "todos".to_string(),
            limit: 10,
            user_id: 1,
            timeout: None,
        }
    }
}

impl RemoteConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.resource.trim_matches('/')
        )
    }

    fn item_url(&self, id: TaskId) -> String {
        format!("{}/{id}", self.collection_url())
    }
}

#[derive(Debug, Deserialize)]
struct RemoteTodo {
    id: TaskId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    completed: bool,
}

impl From<RemoteTodo> for Task {
    fn from(todo: RemoteTodo) -> Self {
        Task {
            id: todo.id,
            text: todo.title,
            completed: todo.completed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    title: &'a str,
    completed: bool,
    user_id: u64,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: TaskId,
}

/// Only the changed fields go over the wire.
#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

impl<'a> From<&'a TaskPatch> for UpdateBody<'a> {
    fn from(patch: &'a TaskPatch) -> Self {
        Self {
            title: patch.text.as_deref(),
            completed: patch.completed,
        }
    }
}

/// Backend over a REST collection; one request per operation, no retry.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    config: RemoteConfig,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Result<Self, StorageError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }
}

fn json_header() -> HeaderValue {
    HeaderValue::from_static(JSON_CONTENT_TYPE)
}

/// Non-2xx statuses count as failures just like transport errors.
fn ensure_success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        warn!(%status, url = %response.url(), "remote request rejected");
        Err(StorageError::Status(status))
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    #[tracing::instrument(skip(self))]
    async fn load(&mut self) -> Result<Vec<Task>, StorageError> {
        let url = format!("{}?_limit={}", self.config.collection_url(), self.config.limit);
        let response = self.client.get(&url).send().await?;
        let body = ensure_success(response)?.bytes().await?;
        let todos: Vec<RemoteTodo> = serde_json::from_slice(&body)?;

        info!(url = %url, count = todos.len(), "loaded remote tasks");
        Ok(todos.into_iter().map(Task::from).collect())
    }

    #[tracing::instrument(skip(self, text))]
    async fn create(&mut self, text: &str) -> Result<Task, StorageError> {
        let body = CreateBody {
            title: text,
            completed: false,
            user_id: self.config.user_id,
        };
        let response = self
            .client
            .post(self.config.collection_url())
            .header(CONTENT_TYPE, json_header())
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;
        let raw = ensure_success(response)?.bytes().await?;
        let created: Created = serde_json::from_slice(&raw)?;

        debug!(id = created.id, "server assigned id");
        Ok(Task::new_pending(created.id, text))
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&mut self, id: TaskId, patch: &TaskPatch) -> Result<(), StorageError> {
        let body = UpdateBody::from(patch);
        let response = self
            .client
            .put(self.config.item_url(id))
            .header(CONTENT_TYPE, json_header())
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&mut self, id: TaskId) -> Result<(), StorageError> {
        let response = self.client.delete(self.config.item_url(id)).send().await?;
        ensure_success(response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteConfig, UpdateBody};
    use crate::task::TaskPatch;

    #[test]
    fn urls_join_without_double_slashes() {
        let config = RemoteConfig::default().with_base_url("http://localhost:9000/");
        assert_eq!(config.collection_url(), "http://localhost:9000/todos");
        assert_eq!(config.item_url(5), "http://localhost:9000/todos/5");
    }

    #[test]
    fn update_body_carries_only_changed_fields() {
        let patch = TaskPatch::completed(true);
        let json = serde_json::to_value(UpdateBody::from(&patch)).unwrap();
        assert_eq!(json, serde_json::json!({"completed": true}));

        let patch = TaskPatch::text("renamed");
        let json = serde_json::to_value(UpdateBody::from(&patch)).unwrap();
        assert_eq!(json, serde_json::json!({"title": "renamed"}));
    }
}
