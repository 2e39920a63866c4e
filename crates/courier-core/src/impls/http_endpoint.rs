//! reqwest ベースの RemoteEndpoint 実装
//!
//! - すべてのリクエストに `X-API-Key` ヘッダ
//! - connect timeout と read timeout を別々に設定
//! - 成功は HTTP 200 のみ（fetch は 204 も「タスクなし」として扱う）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::domain::{EndpointError, ReplyRecord, StatusReport, TaskPayload};
use crate::ports::{FetchOutcome, RemoteEndpoint, encode_batch};

pub const API_KEY_HEADER: &str = "X-API-Key";

pub struct HttpEndpoint {
    client: Client,
    probe_url: String,
    reply_url: String,
    api_key: String,
}

impl HttpEndpoint {
    pub fn new(
        probe_url: impl Into<String>,
        reply_url: impl Into<String>,
        api_key: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| EndpointError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            probe_url: probe_url.into(),
            reply_url: reply_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, EndpointError> {
        Self::new(
            config.probe_url(),
            config.reply_url(),
            config.api_key.clone(),
            config.connect_timeout(),
            config.read_timeout(),
        )
    }

    async fn post_batch<T: Serialize>(&self, url: &str, items: &[T]) -> Result<(), EndpointError> {
        if items.is_empty() {
            return Ok(());
        }
        let body = encode_batch(items)
            .map_err(|e| EndpointError::Malformed(format!("failed to encode batch: {e}")))?;

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        match response.status() {
            StatusCode::OK => {
                debug!(url, count = items.len(), "batch accepted");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(EndpointError::Unauthorized),
            other => Err(EndpointError::UnexpectedStatus(other.as_u16())),
        }
    }
}

#[async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn fetch_task(&self) -> Result<FetchOutcome, EndpointError> {
        let response = self
            .client
            .get(&self.probe_url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.map_err(|e| classify_reqwest_error(&e))?;
                if body.trim().is_empty() {
                    return Ok(FetchOutcome::Empty);
                }
                let payload: TaskPayload = serde_json::from_str(&body)
                    .map_err(|e| EndpointError::Malformed(format!("task payload: {e}")))?;
                Ok(FetchOutcome::Task(payload))
            }
            StatusCode::NO_CONTENT => Ok(FetchOutcome::Empty),
            StatusCode::UNAUTHORIZED => Err(EndpointError::Unauthorized),
            other => Err(EndpointError::UnexpectedStatus(other.as_u16())),
        }
    }

    async fn report_statuses(&self, reports: &[StatusReport]) -> Result<(), EndpointError> {
        self.post_batch(&self.probe_url, reports).await
    }

    async fn submit_replies(&self, replies: &[ReplyRecord]) -> Result<(), EndpointError> {
        self.post_batch(&self.reply_url, replies).await
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> EndpointError {
    if err.is_timeout() || caused_by_timed_out_io(err) {
        EndpointError::Timeout(err.to_string())
    } else if err.is_decode() {
        EndpointError::Malformed(err.to_string())
    } else {
        EndpointError::Transport(err.to_string())
    }
}

fn caused_by_timed_out_io(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if inner
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
        {
            return true;
        }
        source = inner.source();
    }
    false
}
