//! LLM escalation client for low-confidence article scoring.
//!
//! Two paths against the stateless messages API: synchronous per-article
//! calls (bounded concurrency handled by the caller), or a batch submission
//! whose completion is polled until it ends.

use analysis_core::AnalysisError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const BATCH_URL: &str = "https://api.anthropic.com/v1/messages/batches";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-haiku-4-5";
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmScore {
    pub sentiment_raw: f64,
    pub sentiment_label: String,
    pub sentiment_confidence: f64,
}

/// Outcome of the batched path: scored items keyed by the caller's custom id.
#[derive(Debug, Default)]
pub struct LlmBatchOutcome {
    pub scores: Vec<(String, LlmScore)>,
    /// True when the poll ceiling was hit and the batch abandoned.
    pub timed_out: bool,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn prompt(ticker: &str, text: &str) -> String {
        let truncated: String = text.chars().take(1000).collect();
        format!(
            "Classify the sentiment of this Korean stock news article about ticker {ticker}.\n\n\
             Article: {truncated}\n\n\
             Respond in exactly this format and nothing else:\n\
             sentiment: [positive/neutral/negative]\n\
             score: [confidence between 0.0 and 1.0]\n\
             reason: [one line]"
        )
    }

    /// Score one article synchronously. Retries transient failures; a parse
    /// failure yields a neutral low-confidence score rather than an error.
    pub async fn score_article(&self, ticker: &str, text: &str) -> Result<LlmScore, AnalysisError> {
        if !self.is_configured() {
            return Err(AnalysisError::ApiError("LLM API key not configured".to_string()));
        }

        let payload = json!({
            "model": self.model,
            "max_tokens": 200,
            "messages": [{"role": "user", "content": Self::prompt(ticker, text)}],
        });

        let mut last_error = String::new();
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(1000 * 2u64.pow(attempt - 1))).await;
            }

            let response = self
                .client
                .post(API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            if response.status().as_u16() == 429 || response.status().is_server_error() {
                last_error = format!("HTTP {}", response.status());
                continue;
            }

            if !response.status().is_success() {
                return Err(AnalysisError::ApiError(format!(
                    "LLM HTTP {}",
                    response.status()
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            let text = body["content"][0]["text"].as_str().unwrap_or_default();
            return Ok(parse_response(text));
        }

        Err(AnalysisError::ApiError(format!(
            "LLM exhausted retries: {last_error}"
        )))
    }

    /// Submit a batch of (custom_id, ticker, text) items, poll until the
    /// batch ends, and stream the results. Items missing from the results
    /// (or the whole batch on timeout) are simply absent from the outcome;
    /// the caller keeps its stage-1 scores for those.
    pub async fn score_batch(
        &self,
        items: &[(String, String, String)],
        poll_ceiling: Duration,
    ) -> Result<LlmBatchOutcome, AnalysisError> {
        if !self.is_configured() {
            return Err(AnalysisError::ApiError("LLM API key not configured".to_string()));
        }
        if items.is_empty() {
            return Ok(LlmBatchOutcome::default());
        }

        let requests: Vec<Value> = items
            .iter()
            .map(|(custom_id, ticker, text)| {
                json!({
                    "custom_id": custom_id,
                    "params": {
                        "model": self.model,
                        "max_tokens": 200,
                        "messages": [{"role": "user", "content": Self::prompt(ticker, text)}],
                    }
                })
            })
            .collect();

        let response = self
            .client
            .post(BATCH_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "LLM batch submit HTTP {}",
                response.status()
            )));
        }

        let submitted: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;
        let batch_id = submitted["id"]
            .as_str()
            .ok_or_else(|| AnalysisError::ApiError("LLM batch response missing id".to_string()))?
            .to_string();

        tracing::info!("LLM batch {} submitted with {} items", batch_id, items.len());

        // Poll until ended or the ceiling is hit.
        let poll_interval = Duration::from_secs(30);
        let started = std::time::Instant::now();
        let results_url = loop {
            if started.elapsed() > poll_ceiling {
                tracing::warn!(
                    "LLM batch {} exceeded poll ceiling, falling back to local scores",
                    batch_id
                );
                return Ok(LlmBatchOutcome {
                    scores: Vec::new(),
                    timed_out: true,
                });
            }
            tokio::time::sleep(poll_interval).await;

            let status: Value = self
                .client
                .get(format!("{BATCH_URL}/{batch_id}"))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .send()
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?
                .json()
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if status["processing_status"].as_str() == Some("ended") {
                break status["results_url"].as_str().unwrap_or_default().to_string();
            }
        };

        if results_url.is_empty() {
            return Err(AnalysisError::ApiError(format!(
                "LLM batch {batch_id} ended without results_url"
            )));
        }

        let body = self
            .client
            .get(&results_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?
            .text()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let mut scores = Vec::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(row) = serde_json::from_str::<BatchResultLine>(line) else {
                continue;
            };
            if row.result.kind != "succeeded" {
                continue;
            }
            let text = row
                .result
                .message
                .and_then(|m| m.content.into_iter().next())
                .map(|c| c.text)
                .unwrap_or_default();
            scores.push((row.custom_id, parse_response(&text)));
        }

        tracing::info!("LLM batch {}: {} scored results", batch_id, scores.len());
        Ok(LlmBatchOutcome {
            scores,
            timed_out: false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BatchResultLine {
    custom_id: String,
    result: BatchResult,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    #[serde(rename = "type")]
    kind: String,
    message: Option<BatchMessage>,
}

#[derive(Debug, Deserialize)]
struct BatchMessage {
    #[serde(default)]
    content: Vec<BatchContent>,
}

#[derive(Debug, Deserialize)]
struct BatchContent {
    #[serde(default)]
    text: String,
}

/// Parse the strictly-formatted response. Unparseable responses fall back to
/// neutral with confidence 0.5.
fn parse_response(text: &str) -> LlmScore {
    let mut label = "neutral".to_string();
    let mut confidence = 0.5_f64;

    for line in text.lines() {
        let line = line.trim().to_lowercase();
        if let Some(value) = line.strip_prefix("sentiment:") {
            let value = value.trim();
            if value.contains("positive") {
                label = "positive".to_string();
            } else if value.contains("negative") {
                label = "negative".to_string();
            } else {
                label = "neutral".to_string();
            }
        } else if let Some(value) = line.strip_prefix("score:") {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                confidence = parsed.clamp(0.0, 1.0);
            }
        }
    }

    let base = match label.as_str() {
        "positive" => 1.0,
        "negative" => -1.0,
        _ => 0.0,
    };

    LlmScore {
        sentiment_raw: ((base * confidence) * 10_000.0).round() / 10_000.0,
        sentiment_label: label,
        sentiment_confidence: (confidence * 1000.0).round() / 1000.0,
    }
}
