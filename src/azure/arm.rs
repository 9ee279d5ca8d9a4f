//! Azure Resource Manager client for listing and deleting snapshots.
//!
//! Listing uses the generic resource enumeration API with a server-side
//! `resourceType` filter and `$expand=createdTime`, following `nextLink`
//! pagination lazily. Deletion issues a DELETE on the resource id and, when
//! ARM answers 202 Accepted, polls the async operation to its terminal
//! status.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use http::{StatusCode, header};
use serde::Deserialize;
use url::Url;

use super::{BearerTokenSource, SnapshotDeleter, SnapshotLister, SnapshotRecord, SnapshotStream};
use crate::config::AzureConfig;

/// ARM API version for generic resource listing and deletion.
pub const ARM_API_VERSION: &str = "2021-04-01";

/// Server-side filter limiting the enumeration to managed disk snapshots.
const SNAPSHOT_TYPE_FILTER: &str = "resourceType eq 'Microsoft.Compute/snapshots'";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

/// Errors from the ARM collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("Azure authentication error: {0}")]
    Auth(String),

    #[error("Request to Azure Resource Manager failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid Azure Resource Manager URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Azure Resource Manager returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("202 response is missing an Azure-AsyncOperation or Location header")]
    MissingOperationUrl,

    #[error("Delete operation finished with status {0}")]
    OperationFailed(String),

    #[error("Delete operation did not reach a terminal state after {0} polls")]
    PollTimeout(u32),
}

/// Reqwest-based ARM client scoped to one subscription and resource group.
pub struct ArmClient {
    client: reqwest::Client,
    tokens: Arc<dyn BearerTokenSource>,
    endpoint: Url,
    subscription_id: String,
    resource_group: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl ArmClient {
    pub fn new(
        client: reqwest::Client,
        tokens: Arc<dyn BearerTokenSource>,
        config: &AzureConfig,
    ) -> Result<Self, ArmError> {
        Ok(Self {
            client,
            tokens,
            endpoint: Url::parse(&config.management_endpoint)?,
            subscription_id: config.subscription_id.clone(),
            resource_group: config.resource_group.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        })
    }

    /// Override how often the delete path polls a 202 async operation.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn list_url(&self) -> Result<Url, ArmError> {
        let mut url = self.endpoint.join(&format!(
            "/subscriptions/{}/resourceGroups/{}/resources",
            self.subscription_id, self.resource_group
        ))?;
        url.query_pairs_mut()
            .append_pair("$filter", SNAPSHOT_TYPE_FILTER)
            .append_pair("$expand", "createdTime")
            .append_pair("api-version", ARM_API_VERSION);
        Ok(url)
    }

    async fn fetch_page(&self, url: Url) -> Result<ResourcePage, ArmError> {
        let bearer = self.tokens.bearer_header().await?;
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, bearer.as_ref())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Poll a 202 async operation until it reaches a terminal status.
    async fn await_operation(&self, url: Url) -> Result<(), ArmError> {
        for _ in 0..self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let bearer = self.tokens.bearer_header().await?;
            let response = self
                .client
                .get(url.clone())
                .header(header::AUTHORIZATION, bearer.as_ref())
                .send()
                .await?;

            match response.status() {
                StatusCode::ACCEPTED => continue,
                StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                    // An Azure-AsyncOperation body carries an explicit status;
                    // a Location-style 200 with no parsable body means done.
                    let body = response.text().await.unwrap_or_default();
                    let status = serde_json::from_str::<OperationStatus>(&body)
                        .ok()
                        .and_then(|op| op.status);
                    match status.as_deref() {
                        None | Some("Succeeded") => return Ok(()),
                        Some("InProgress") | Some("Running") => continue,
                        Some(terminal) => {
                            return Err(ArmError::OperationFailed(terminal.to_string()));
                        }
                    }
                }
                _ => return Err(api_error(response).await),
            }
        }

        Err(ArmError::PollTimeout(self.max_poll_attempts))
    }
}

impl SnapshotLister for ArmClient {
    fn list_snapshots(&self) -> SnapshotStream<'_> {
        let pages = stream::try_unfold(PageState::Start, move |state| async move {
            let url = match state {
                PageState::Start => self.list_url()?,
                PageState::Next(url) => url,
                PageState::Done => return Ok::<_, ArmError>(None),
            };

            let page = self.fetch_page(url).await?;
            tracing::debug!(count = page.value.len(), "Fetched resource page");

            let next = match page.next_link.as_deref() {
                Some(link) => PageState::Next(Url::parse(link)?),
                None => PageState::Done,
            };
            Ok(Some((page.value, next)))
        });

        pages
            .map_ok(|records| stream::iter(records.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}

#[async_trait]
impl SnapshotDeleter for ArmClient {
    async fn delete_snapshot(&self, record: &SnapshotRecord) -> Result<(), ArmError> {
        let mut url = self.endpoint.join(&record.id)?;
        url.query_pairs_mut()
            .append_pair("api-version", ARM_API_VERSION);

        let bearer = self.tokens.bearer_header().await?;
        let response = self
            .client
            .delete(url)
            .header(header::AUTHORIZATION, bearer.as_ref())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::ACCEPTED => {
                let poll_url = operation_url(response.headers())?;
                self.await_operation(poll_url).await
            }
            _ => Err(api_error(response).await),
        }
    }
}

enum PageState {
    Start,
    Next(Url),
    Done,
}

/// One page of the generic resource listing.
#[derive(Debug, Deserialize)]
struct ResourcePage {
    #[serde(default)]
    value: Vec<SnapshotRecord>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

/// Status body of an ARM async operation.
#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    status: Option<String>,
}

/// Where to poll for a 202-accepted operation: `Azure-AsyncOperation`
/// preferred, `Location` as fallback.
fn operation_url(headers: &http::HeaderMap) -> Result<Url, ArmError> {
    let value = headers
        .get("azure-asyncoperation")
        .or_else(|| headers.get(header::LOCATION))
        .and_then(|v| v.to_str().ok())
        .ok_or(ArmError::MissingOperationUrl)?;
    Ok(Url::parse(value)?)
}

async fn api_error(response: reqwest::Response) -> ArmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ArmError::Api { status, body }
}
