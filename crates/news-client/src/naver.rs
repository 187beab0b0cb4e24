//! News-search API client.

use analysis_core::{AnalysisError, NewsArticle};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_URL: &str = "https://openapi.naver.com/v1/search/news.json";
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    originallink: String,
    #[serde(default)]
    link: String,
    #[serde(rename = "pubDate", default)]
    pub_date: String,
}

#[derive(Clone)]
pub struct NewsSearchClient {
    client: Client,
    client_id: String,
    client_secret: String,
}

impl NewsSearchClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            client_id,
            client_secret,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Fetch recent news for a stock name, normalised into article records.
    /// Retries 429 and transient errors with exponential backoff; an empty
    /// result after exhausting retries surfaces as an ApiError for the caller
    /// to degrade on.
    pub async fn fetch_news(
        &self,
        ticker: &str,
        stock_name: &str,
        display: u32,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        if !self.is_configured() {
            tracing::debug!("news search credentials not configured, skipping");
            return Ok(Vec::new());
        }

        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let wait = Duration::from_millis(1000 * 2u64.pow(attempt - 1));
                tokio::time::sleep(wait).await;
            }

            let display_count = display.min(100).to_string();
            let response = self
                .client
                .get(SEARCH_URL)
                .header("X-Naver-Client-Id", &self.client_id)
                .header("X-Naver-Client-Secret", &self.client_secret)
                .query(&[
                    ("query", stock_name),
                    ("display", display_count.as_str()),
                    ("sort", "date"),
                ])
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            if response.status().as_u16() == 429 {
                tracing::debug!(
                    "news search 429 for '{}', retry {}/{}",
                    stock_name,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = "rate limited".to_string();
                continue;
            }

            if response.status().is_server_error() {
                last_error = format!("HTTP {}", response.status());
                continue;
            }

            if !response.status().is_success() {
                return Err(AnalysisError::ApiError(format!(
                    "news search HTTP {}",
                    response.status()
                )));
            }

            let body: SearchResponse = response
                .json()
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            let articles = body
                .items
                .into_iter()
                .filter_map(|item| self.normalize(ticker, item))
                .collect::<Vec<_>>();

            tracing::debug!("news search: {} articles for '{}'", articles.len(), stock_name);
            return Ok(articles);
        }

        Err(AnalysisError::ApiError(format!(
            "news search exhausted retries for '{stock_name}': {last_error}"
        )))
    }

    fn normalize(&self, ticker: &str, item: SearchItem) -> Option<NewsArticle> {
        let published_at = parse_pub_date(&item.pub_date)?;

        let title = crate::strip_html(&item.title);
        let description = crate::strip_html(&item.description);
        let source_url = if !item.originallink.is_empty() {
            item.originallink
        } else {
            item.link
        };

        let source_type = crate::classify_source(&source_url);
        let article_type = crate::classify_article_type(&title, &description);

        Some(NewsArticle {
            ticker: ticker.to_string(),
            title,
            description: if description.is_empty() {
                None
            } else {
                Some(description)
            },
            source_name: crate::extract_domain(&source_url),
            source_url,
            published_at,
            article_type: article_type.to_string(),
            source_type: source_type.to_string(),
            importance_weight: 1.0,
            sentiment_raw: None,
            sentiment_label: None,
            sentiment_confidence: None,
            scoring_method: None,
        })
    }
}

/// The search API emits RFC 2822 dates ("Thu, 20 Feb 2025 09:00:00 +0900");
/// ISO 8601 is accepted as a fallback.
fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc2822_dates() {
        let dt = parse_pub_date("Thu, 20 Feb 2025 09:00:00 +0900").unwrap();
        assert_eq!(dt.timezone(), Utc);
    }

    #[test]
    fn parses_iso_fallback() {
        assert!(parse_pub_date("2025-02-20T09:00:00+09:00").is_some());
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_pub_date("").is_none());
        assert!(parse_pub_date("not a date").is_none());
    }

    #[test]
    fn unconfigured_client_returns_empty() {
        let client = NewsSearchClient::new(String::new(), String::new());
        let articles = tokio_test::block_on(client.fetch_news("005930", "삼성전자", 100)).unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn normalize_prefers_original_link() {
        let client = NewsSearchClient::new("id".into(), "secret".into());
        let item = SearchItem {
            title: "<b>호실적</b>".to_string(),
            description: "영업이익 증가".to_string(),
            originallink: "https://www.mk.co.kr/news/1".to_string(),
            link: "https://search.example.com/redirect".to_string(),
            pub_date: "Thu, 20 Feb 2025 09:00:00 +0900".to_string(),
        };
        let article = client.normalize("005930", item).unwrap();
        assert_eq!(article.source_url, "https://www.mk.co.kr/news/1");
        assert_eq!(article.source_type, "financial");
        assert_eq!(article.article_type, "earnings");
        assert_eq!(article.title, "호실적");
        assert!(article.scoring_method.is_none());
    }
}
