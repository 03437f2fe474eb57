use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SettingsProvider;
use crate::error::{HonyakuError, Result};

/// Upper bound for a single non-streaming request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

/// One progress line of a model pull, as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelPullProgress {
    pub status: Option<String>,
    pub completed: Option<u64>,
    pub total: Option<u64>,
}

impl ModelPullProgress {
    pub fn percent(&self) -> Option<f64> {
        match (self.completed, self.total) {
            (Some(completed), Some(total)) if total > 0 => {
                Some(completed as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Completed,
    Cancelled,
}

/// Operations offered by the local inference server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Single-shot, non-streaming generation
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;

    /// Generation with base64 encoded images attached to the prompt
    async fn generate_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: Vec<String>,
    ) -> Result<String>;

    /// Names of the models installed on the server
    async fn list_tags(&self) -> Result<Vec<String>>;

    /// Whether `model` is installed, ignoring case
    async fn is_model_available(&self, model: &str) -> Result<bool>;

    /// Download `model` onto the server, reporting one update per progress line.
    ///
    /// Cancelling `cancel` stops reading immediately and drops the connection;
    /// that is reported as [`PullOutcome::Cancelled`], not as an error.
    async fn pull_model(
        &self,
        model: &str,
        progress: Option<UnboundedSender<ModelPullProgress>>,
        cancel: CancellationToken,
    ) -> Result<PullOutcome>;
}

/// HTTP client for the ollama API
pub struct OllamaClient {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
}

impl OllamaClient {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Result<Self> {
        // no overall timeout here: pulls may stream for a long time
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("honyaku/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, settings })
    }

    /// Resolve an API path against the base URL currently in the settings.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base_url = self.settings.current().ollama_url;
        let base = Url::parse(base_url.trim())
            .map_err(|e| HonyakuError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(HonyakuError::InvalidUrl(base_url));
        }

        base.join(path)
            .map_err(|e| HonyakuError::InvalidUrl(format!("{}: {}", base_url, e)))
    }

    async fn send_generate(&self, request: &GenerateRequest<'_>) -> Result<String> {
        let url = self.endpoint("/api/generate")?;
        debug!("Sending generate request to: {}", url);

        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Ollama error ({}): {}", status, body);
            return Err(HonyakuError::InferenceRequestFailed {
                status: status.as_u16(),
            });
        }

        parse_generate_response(&body)
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images: None,
        };
        self.send_generate(&request).await
    }

    async fn generate_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: Vec<String>,
    ) -> Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images: Some(&images),
        };
        self.send_generate(&request).await
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Listing models at: {}", url);

        let response = self.client.get(url).timeout(REQUEST_TIMEOUT).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Ollama tags error ({}): {}", status, body);
            return Err(HonyakuError::InferenceRequestFailed {
                status: status.as_u16(),
            });
        }

        parse_tags(&body)
    }

    async fn is_model_available(&self, model: &str) -> Result<bool> {
        let tags = self.list_tags().await?;
        Ok(contains_model(&tags, model))
    }

    async fn pull_model(
        &self,
        model: &str,
        progress: Option<UnboundedSender<ModelPullProgress>>,
        cancel: CancellationToken,
    ) -> Result<PullOutcome> {
        let url = self.endpoint("/api/pull")?;
        info!("Pulling model {} from {}", model, url);

        let request = PullRequest {
            name: model,
            stream: true,
        };
        let send = self.client.post(url).json(&request).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Model pull cancelled before the server answered");
                return Ok(PullOutcome::Cancelled);
            }
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Ollama pull error ({}): {}", status, body);
            return Err(HonyakuError::InferenceRequestFailed {
                status: status.as_u16(),
            });
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let outcome = read_pull_stream(StreamReader::new(Box::pin(body)), progress.as_ref(), &cancel).await?;
        if outcome == PullOutcome::Completed {
            info!("Model {} pulled", model);
        }
        Ok(outcome)
    }
}

/// Consume a newline-delimited JSON pull stream.
///
/// The reader is dropped on every return path, which releases the
/// underlying connection.
pub async fn read_pull_stream<R>(
    reader: R,
    progress: Option<&UnboundedSender<ModelPullProgress>>,
    cancel: &CancellationToken,
) -> Result<PullOutcome>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Model pull cancelled");
                return Ok(PullOutcome::Cancelled);
            }
            next = lines.next_line() => next?,
        };

        let Some(line) = next else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let update = parse_pull_line(&line)?;
        debug!(
            "Pull progress: {:?} {:?}/{:?}",
            update.status, update.completed, update.total
        );

        if let Some(tx) = progress {
            // a dropped receiver only means nobody is watching
            let _ = tx.send(update);
        }
    }

    Ok(PullOutcome::Completed)
}

/// Parse one line of the pull stream. A line carrying `error` aborts the pull.
pub fn parse_pull_line(line: &str) -> Result<ModelPullProgress> {
    let value: Value = serde_json::from_str(line)?;

    if let Some(error) = value.get("error") {
        let message = error.as_str().unwrap_or("Ollama pull failed.");
        return Err(HonyakuError::PullFailed(message.to_string()));
    }

    Ok(ModelPullProgress {
        status: value.get("status").and_then(Value::as_str).map(str::to_string),
        completed: value.get("completed").and_then(Value::as_u64),
        total: value.get("total").and_then(Value::as_u64),
    })
}

fn parse_generate_response(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)?;
    value
        .get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(HonyakuError::UnexpectedResponseShape)
}

fn parse_tags(body: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(body)?;
    let Some(models) = value.get("models").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    Ok(models
        .iter()
        .filter_map(|model| model.get("name").and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Case-insensitive check whether `model` is among the installed `tags`.
pub fn contains_model(tags: &[String], model: &str) -> bool {
    tags.iter().any(|tag| tag.eq_ignore_ascii_case(model))
}
