//! Azure OpenAI style chat completions over HTTP

use serde_json::{json, Value};
use std::time::Duration;
use switchboard_core::{ChatModel, ChatPrompt};

const DEFAULT_API_VERSION: &str = "2024-08-01-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a chat deployment
#[derive(Debug, Clone, PartialEq)]
pub struct AzureConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl AzureConfig {
    /// Read `AZURE_OPENAI_*` variables. `Ok(None)` when no endpoint or key is set.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let endpoint = non_empty_env("AZURE_OPENAI_ENDPOINT");
        let api_key = non_empty_env("AZURE_OPENAI_API_KEY");
        let (Some(endpoint), Some(api_key)) = (endpoint, api_key) else {
            return Ok(None);
        };
        let deployment = non_empty_env("AZURE_OPENAI_DEPLOYMENT").ok_or_else(|| {
            anyhow::anyhow!("AZURE_OPENAI_DEPLOYMENT must be set alongside the endpoint")
        })?;
        let api_version = non_empty_env("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let timeout_secs = match non_empty_env("AZURE_OPENAI_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                anyhow::anyhow!("AZURE_OPENAI_TIMEOUT_SECS must be whole seconds, got `{raw}`")
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Some(Self {
            endpoint,
            api_key,
            deployment,
            api_version,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Chat model client. Calls block the current thread on a private runtime,
/// so `complete` must not be called from inside another tokio runtime.
pub struct HttpChatModel {
    config: AzureConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpChatModel {
    pub fn new(config: AzureConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            client,
            runtime,
        })
    }

    pub fn config(&self) -> &AzureConfig {
        &self.config
    }

    pub async fn complete_async(&self, prompt: &ChatPrompt) -> anyhow::Result<String> {
        let response = self
            .client
            .post(self.config.completions_url())
            .header("api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("no error message");
            anyhow::bail!("chat completion failed with {status}: {message}");
        }
        reply_text(&body)
    }
}

impl ChatModel for HttpChatModel {
    fn complete(&self, prompt: &ChatPrompt) -> anyhow::Result<String> {
        let started = std::time::Instant::now();
        let result = self.runtime.block_on(self.complete_async(prompt));
        tracing::debug!(
            deployment = %self.config.deployment,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "chat completion"
        );
        result
    }
}

fn request_body(prompt: &ChatPrompt) -> Value {
    let mut body = json!({
        "messages": [
            {"role": "system", "content": prompt.system},
            {"role": "user", "content": prompt.user},
        ],
        "temperature": prompt.temperature,
    });
    if prompt.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

fn reply_text(body: &Value) -> anyhow::Result<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("chat completion response has no message content"))
}
