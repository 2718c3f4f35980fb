//! Call Automation REST client

use super::auth::HmacSigner;
use super::connection_string::ConnectionString;
use super::models::{AnswerCallBody, CallConnectionPropertiesDto, ErrorResponse, TransferBody};
use crate::domain::platform::{
    AnswerCallRequest, AnsweredCall, CallAutomation, CallConnectionProperties, TransferRequest,
};
use crate::domain::shared::{DomainError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_API_VERSION: &str = "2024-09-15";

pub struct AcsCallAutomationClient {
    http: reqwest::Client,
    endpoint: Url,
    signer: HmacSigner,
    api_version: String,
    request_timeout: Option<Duration>,
}

impl AcsCallAutomationClient {
    /// Build a client for the resource named by `connection_string`
    ///
    /// Requests have no deadline unless `request_timeout` is set; a platform
    /// command then waits as long as the connection stays open.
    pub fn new(
        connection_string: &str,
        api_version: &str,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let parsed = ConnectionString::parse(connection_string)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| DomainError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        info!(
            "Call automation client ready: endpoint={}, api-version={}, timeout={:?}",
            parsed.endpoint(),
            api_version,
            request_timeout
        );

        Ok(Self {
            http,
            endpoint: parsed.endpoint().clone(),
            signer: HmacSigner::new(parsed.access_key()),
            api_version: api_version.to_string(),
            request_timeout,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    fn command_url(&self, command: &str, path: &str) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| DomainError::platform(command, format!("invalid request path: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Send one signed request; returns the response body on 2xx
    async fn execute<B: Serialize>(
        &self,
        command: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String> {
        let url = self.command_url(command, path)?;
        let payload = match body {
            Some(body) => serde_json::to_vec(body)
                .map_err(|e| DomainError::platform(command, format!("failed to encode request: {}", e)))?,
            None => Vec::new(),
        };
        let signed = self.signer.sign(method.as_str(), &url, &payload, Utc::now())?;

        debug!("{} {} ({})", method, url.path(), command);

        let mut request = self
            .http
            .request(method, url)
            .header("x-ms-date", signed.date)
            .header("x-ms-content-sha256", signed.content_hash)
            .header(reqwest::header::AUTHORIZATION, signed.authorization);
        if body.is_some() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let response = request.send().await.map_err(|e| {
            error!("{} request failed: {}", command, e);
            DomainError::platform(command, e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = ErrorResponse::summarize(&text).unwrap_or_else(|| status.to_string());
            error!("{} rejected with {}: {}", command, status, detail);
            return Err(DomainError::platform(
                command,
                format!("HTTP {}: {}", status.as_u16(), detail),
            ));
        }

        Ok(text)
    }

    fn decode_properties(command: &str, body: &str) -> Result<CallConnectionPropertiesDto> {
        serde_json::from_str(body)
            .map_err(|e| DomainError::platform(command, format!("unexpected response body: {}", e)))
    }
}

fn connection_path(call_connection_id: &str, action: Option<&str>) -> String {
    let id = url_segment(call_connection_id);
    match action {
        Some(action) => format!("/calling/callConnections/{}:{}", id, action),
        None => format!("/calling/callConnections/{}", id),
    }
}

// Connection ids are opaque; keep them from breaking out of the path segment
fn url_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '?' | '#' | '%' | ' ' => '_',
            other => other,
        })
        .collect()
}

#[async_trait]
impl CallAutomation for AcsCallAutomationClient {
    async fn answer_call(&self, request: AnswerCallRequest) -> Result<AnsweredCall> {
        const COMMAND: &str = "answer_call";
        let body = AnswerCallBody::from(request);
        let text = self
            .execute(COMMAND, Method::POST, "/calling/callConnections:answer", Some(&body))
            .await?;
        let dto = Self::decode_properties(COMMAND, &text)?;
        info!("Call answered: call_connection_id={}", dto.call_connection_id);
        Ok(dto.into())
    }

    async fn get_call_properties(&self, call_connection_id: &str) -> Result<CallConnectionProperties> {
        const COMMAND: &str = "get_call_properties";
        let text = self
            .execute::<()>(COMMAND, Method::GET, &connection_path(call_connection_id, None), None)
            .await?;
        Ok(Self::decode_properties(COMMAND, &text)?.into())
    }

    async fn hang_up(&self, call_connection_id: &str, for_everyone: bool) -> Result<()> {
        if for_everyone {
            self.execute::<()>(
                "hang_up",
                Method::POST,
                &connection_path(call_connection_id, Some("terminate")),
                None,
            )
            .await?;
        } else {
            self.execute::<()>(
                "hang_up",
                Method::DELETE,
                &connection_path(call_connection_id, None),
                None,
            )
            .await?;
        }
        info!("Call hung up: call_connection_id={}", call_connection_id);
        Ok(())
    }

    async fn transfer_to_participant(
        &self,
        call_connection_id: &str,
        request: TransferRequest,
    ) -> Result<()> {
        let target = request.target.clone();
        let body = TransferBody::from(request);
        self.execute(
            "transfer_to_participant",
            Method::POST,
            &connection_path(call_connection_id, Some("transferToParticipant")),
            Some(&body),
        )
        .await?;
        info!(
            "Transfer requested: call_connection_id={}, target={}",
            call_connection_id, target
        );
        Ok(())
    }
}
