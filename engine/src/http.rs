//! JSON-over-HTTP implementation of [`RemoteService`].
//!
//! Expects the resource layout served by `tether-server`:
//!
//! | Call          | Request                          |
//! |---------------|----------------------------------|
//! | `list`        | `GET    {base}/users`            |
//! | `get`         | `GET    {base}/users/{id}`       |
//! | `create`      | `POST   {base}/users`            |
//! | `update`      | `PATCH  {base}/users/{id}`       |
//! | `delete`      | `DELETE {base}/users/{id}`       |
//! | `bulk_delete` | `POST   {base}/users/bulk-delete`|
//!
//! HTTP 404 on a call that names an id maps to [`RemoteError::NotFound`];
//! every other failure maps to [`RemoteError::Failure`].

use crate::remote::{RemoteError, RemoteResult, RemoteService};
use crate::{Attributes, Entity, EntityId};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Remote service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    resource: String,
}

#[derive(Serialize)]
struct BulkDeleteRequest<'a> {
    ids: &'a [EntityId],
}

impl HttpRemote {
    /// Talk to `{base_url}/users`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Use a preconfigured client (timeouts, headers, ...).
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resource: "users".to_string(),
        }
    }

    /// Use a different collection path than `users`.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into().trim_matches('/').to_string();
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.resource)
    }

    fn entity_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.resource, id)
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Failure(e.to_string())
}

async fn check_status(response: Response, id: Option<&str>) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(RemoteError::NotFound(id.to_string()));
        }
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Failure(format!("{status}: {body}")))
}

async fn json_body<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    response.json::<T>().await.map_err(transport)
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn list(&self) -> RemoteResult<Vec<Entity>> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(response, None).await?).await
    }

    async fn get(&self, id: &str) -> RemoteResult<Entity> {
        let response = self
            .client
            .get(self.entity_url(id))
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(response, Some(id)).await?).await
    }

    async fn create(&self, payload: &Attributes) -> RemoteResult<Entity> {
        let response = self
            .client
            .post(self.collection_url())
            .json(payload)
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(response, None).await?).await
    }

    async fn update(&self, id: &str, payload: &Attributes) -> RemoteResult<Entity> {
        let response = self
            .client
            .patch(self.entity_url(id))
            .json(payload)
            .send()
            .await
            .map_err(transport)?;
        json_body(check_status(response, Some(id)).await?).await
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.entity_url(id))
            .send()
            .await
            .map_err(transport)?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn bulk_delete(&self, ids: &[EntityId]) -> RemoteResult<()> {
        let response = self
            .client
            .post(format!("{}/bulk-delete", self.collection_url()))
            .json(&BulkDeleteRequest { ids })
            .send()
            .await
            .map_err(transport)?;
        check_status(response, None).await?;
        Ok(())
    }
}
