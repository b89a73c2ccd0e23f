//! One-shot tool client (`POST /tools/invoke`).
//!
//! Stateless: every call is an independent HTTP request carrying the bearer
//! token when one is configured. Usable whether or not the duplex connection
//! is up.

use crate::config::GatewayConfig;
use crate::error::{CoreError, ToolError};

use common::{HttpStatusCode, RedactedToken};
use models::{ToolInvocation, ToolReply};

use std::time::Duration;

use log::debug;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const PING_TIMEOUT_DURATION: Duration = Duration::from_secs(3);

pub const TOOLS_INVOKE_ENDPOINT: &str = "tools/invoke";
pub const HEALTH_ENDPOINT: &str = "health";

pub const TOOL_MEMORY_SEARCH: &str = "memory_search";
pub const TOOL_MEMORY_GET: &str = "memory_get";
pub const TOOL_READ: &str = "read";
pub const TOOL_WRITE: &str = "write";

const GENERIC_FAILURE_MESSAGE: &str = "tool invocation failed";

#[derive(Clone)]
pub struct ToolClient {
    base_url: Url,
    client: Client,
    token: Option<RedactedToken>,
}

impl ToolClient {
    pub fn new(base_url_str: &str, token: Option<&str>) -> Result<Self, ToolError> {
        let mut base_url = Url::parse(base_url_str)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self {
            base_url,
            client,
            token: token
                .filter(|t| !t.is_empty())
                .map(|t| RedactedToken::new(t.to_string())),
        })
    }

    /// Build from gateway settings (same host, port and token).
    pub fn from_config(config: &GatewayConfig) -> Result<Self, CoreError> {
        let base_url = config.http_base_url()?;
        Ok(Self::new(base_url.as_str(), config.token_str())?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn prepare_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Invoke one tool and return its `result` (or `null` when absent).
    pub async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ToolError> {
        let url = self.base_url.join(TOOLS_INVOKE_ENDPOINT)?;
        let tool = invocation.tool.as_str();

        debug!("Invoking tool '{tool}'");
        let response = self
            .prepare_request(self.client.post(url))
            .json(invocation)
            .send()
            .await?;

        let response = check_status(tool, response).await?;
        let reply: ToolReply = serde_json::from_str(&response.text().await?)?;

        if !reply.ok {
            let message = reply
                .error
                .and_then(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            return Err(ToolError::failed(tool, message));
        }

        Ok(reply.result.unwrap_or(Value::Null))
    }

    pub async fn memory_search(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<Value, ToolError> {
        let mut args = json!({ "query": query });
        if let Some(max_results) = max_results {
            args["maxResults"] = json!(max_results);
        }
        self.invoke(&ToolInvocation::new(TOOL_MEMORY_SEARCH).with_args(args))
            .await
    }

    pub async fn memory_get(
        &self,
        path: &str,
        from: Option<u32>,
        lines: Option<u32>,
    ) -> Result<Value, ToolError> {
        let mut args = json!({ "path": path });
        if let Some(from) = from {
            args["from"] = json!(from);
        }
        if let Some(lines) = lines {
            args["lines"] = json!(lines);
        }
        self.invoke(&ToolInvocation::new(TOOL_MEMORY_GET).with_args(args))
            .await
    }

    pub async fn read_file(&self, path: &str) -> Result<Value, ToolError> {
        self.invoke(&ToolInvocation::new(TOOL_READ).with_args(json!({ "path": path })))
            .await
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<Value, ToolError> {
        self.invoke(
            &ToolInvocation::new(TOOL_WRITE).with_args(json!({ "path": path, "content": content })),
        )
        .await
    }

    /// Plain `GET {base}/{path}` returning the raw body text.
    ///
    /// Used for the fallback resources; status codes map the same way as for
    /// tool calls, with `path` standing in for the tool name.
    pub async fn fetch_resource(&self, path: &str) -> Result<String, ToolError> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        let response = self.prepare_request(self.client.get(url)).send().await?;
        let response = check_status(path, response).await?;
        Ok(response.text().await?)
    }

    /// Liveness probe: `GET {base}/health` with a 3-second timeout.
    ///
    /// Never errors; any failure is `false`.
    pub async fn ping(&self) -> bool {
        let url = match self.base_url.join(HEALTH_ENDPOINT) {
            Ok(url) => url,
            Err(e) => {
                debug!("Ping failed: {e}");
                return false;
            }
        };

        match self
            .prepare_request(self.client.get(url))
            .timeout(PING_TIMEOUT_DURATION)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!("Ping failed for {}: status={}", self.base_url, resp.status());
                false
            }
            Err(e) => {
                debug!("Ping failed for {}: {e}", self.base_url);
                false
            }
        }
    }
}

impl std::fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token)
            .finish()
    }
}

/// Map HTTP status onto the tool error taxonomy.
async fn check_status(tool: &str, response: Response) -> Result<Response, ToolError> {
    let status = HttpStatusCode(response.status().as_u16());
    if status.is_success() {
        return Ok(response);
    }

    match status {
        HttpStatusCode::UNAUTHORIZED => Err(ToolError::unauthorized(tool)),
        HttpStatusCode::NOT_FOUND => Err(ToolError::not_found(tool)),
        HttpStatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            Err(ToolError::rate_limited(tool, retry_after))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ToolError::http(tool, status.0, body))
        }
    }
}
