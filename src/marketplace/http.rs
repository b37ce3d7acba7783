//! REST client for the hosted task marketplace.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::config::MarketplaceConfig;
use crate::error::MarketplaceError;
use crate::marketplace::{AuditEntry, Marketplace};
use crate::task::{Task, TaskList};

const USER_AGENT: &str = concat!("marketplace-worker/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct CompleteBody<'a> {
    summary: &'a str,
}

/// Marketplace backed by the BlackRoad REST API.
pub struct HttpMarketplace {
    config: MarketplaceConfig,
    client: reqwest::Client,
}

impl HttpMarketplace {
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MarketplaceError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> MarketplaceError {
        if e.is_timeout() {
            MarketplaceError::Timeout(self.config.timeout)
        } else {
            MarketplaceError::Request(e.to_string())
        }
    }

    /// Send a request and turn non-2xx statuses into errors.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        task_id: Option<&str>,
    ) -> Result<reqwest::Response, MarketplaceError> {
        let resp = request
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::CONFLICT {
            return Err(MarketplaceError::Conflict {
                task_id: task_id.unwrap_or_default().to_string(),
            });
        }

        let body = resp.text().await.unwrap_or_default();
        Err(MarketplaceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Marketplace for HttpMarketplace {
    async fn list_available(&self) -> Result<Vec<Task>, MarketplaceError> {
        let request = self
            .client
            .get(self.url("/tasks"))
            .query(&[("status", "available")]);
        let resp = self.send(request, None).await?;

        let list: TaskList = resp
            .json()
            .await
            .map_err(|e| MarketplaceError::Decode(e.to_string()))?;
        Ok(list.tasks)
    }

    async fn claim(&self, task_id: &str) -> Result<(), MarketplaceError> {
        let request = self.client.post(self.url(&format!("/tasks/{task_id}/claim")));
        self.send(request, Some(task_id)).await?;
        Ok(())
    }

    async fn complete(&self, task_id: &str, summary: &str) -> Result<(), MarketplaceError> {
        let request = self
            .client
            .post(self.url(&format!("/tasks/{task_id}/complete")))
            .json(&CompleteBody { summary });
        self.send(request, Some(task_id)).await?;
        Ok(())
    }

    async fn log_audit(&self, entry: &AuditEntry) -> Result<(), MarketplaceError> {
        let request = self.client.post(self.url("/memory/log")).json(entry);
        self.send(request, None).await?;
        Ok(())
    }
}
