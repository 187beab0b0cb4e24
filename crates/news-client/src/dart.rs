//! Official disclosure-list API client.
//!
//! Disclosures are administrative text, so they arrive pre-scored as
//! rule-based neutral with confidence 1.0 and bypass the classifier stages.

use analysis_core::{AnalysisError, NewsArticle};
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const LIST_URL: &str = "https://opendart.fss.or.kr/api/list.json";
const MAX_RETRIES: u32 = 5;

/// Disclosure class -> (label, importance weight).
const TYPE_WEIGHTS: [(&str, &str, f64); 10] = [
    ("A", "Material report", 2.0),
    ("B", "Management matters", 1.8),
    ("C", "Issuance", 1.5),
    ("D", "Equity holdings", 1.5),
    ("E", "Other", 1.0),
    ("F", "External audit", 1.5),
    ("G", "Funds", 1.0),
    ("H", "Asset securitisation", 1.0),
    ("I", "Exchange notice", 1.5),
    ("J", "Fair trade notice", 1.0),
];

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    list: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(default)]
    report_nm: String,
    #[serde(default)]
    rcept_dt: String,
    #[serde(default)]
    rcept_no: String,
    #[serde(default)]
    pblntf_ty: String,
}

#[derive(Clone)]
pub struct DisclosureClient {
    client: Client,
    api_key: String,
}

impl DisclosureClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Fetch disclosures for a stock code between two dates (YYYYMMDD).
    /// Status "000" is success and "013" an empty result; anything else is
    /// logged and treated as no data.
    pub async fn fetch_disclosures(
        &self,
        ticker: &str,
        begin_date: &str,
        end_date: &str,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        if !self.is_configured() {
            tracing::debug!("disclosure API key not configured, skipping");
            return Ok(Vec::new());
        }

        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(1000 * 2u64.pow(attempt - 1))).await;
            }

            let response = self
                .client
                .get(LIST_URL)
                .query(&[
                    ("crtfc_key", self.api_key.as_str()),
                    ("bgn_de", begin_date),
                    ("end_de", end_date),
                    ("stock_code", ticker),
                    ("page_count", "100"),
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

            if response.status().is_server_error() || response.status().as_u16() == 429 {
                last_error = format!("HTTP {}", response.status());
                continue;
            }

            if !response.status().is_success() {
                return Err(AnalysisError::ApiError(format!(
                    "disclosure list HTTP {}",
                    response.status()
                )));
            }

            let body: ListResponse = response
                .json()
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            match body.status.as_str() {
                "000" => {}
                "013" => return Ok(Vec::new()),
                other => {
                    tracing::debug!("disclosure list status {}: {}", other, body.message);
                    return Ok(Vec::new());
                }
            }

            let articles = body
                .list
                .into_iter()
                .filter_map(|item| normalize(ticker, item))
                .collect::<Vec<_>>();

            tracing::debug!("disclosures: {} rows for {}", articles.len(), ticker);
            return Ok(articles);
        }

        Err(AnalysisError::ApiError(format!(
            "disclosure list exhausted retries for {ticker}: {last_error}"
        )))
    }
}

fn normalize(ticker: &str, item: ListItem) -> Option<NewsArticle> {
    let date = NaiveDate::parse_from_str(&item.rcept_dt, "%Y%m%d").ok()?;
    let published_at = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);

    let (label, weight) = TYPE_WEIGHTS
        .iter()
        .find(|(code, _, _)| *code == item.pblntf_ty)
        .map(|(_, label, weight)| (*label, *weight))
        .unwrap_or(("Other", 1.0));

    Some(NewsArticle {
        ticker: ticker.to_string(),
        title: format!("[Disclosure] {}", item.report_nm),
        description: Some(format!("{} - {}", label, item.report_nm)),
        source_url: format!(
            "https://dart.fss.or.kr/dsaf001/main.do?rcpNo={}",
            item.rcept_no
        ),
        source_name: "DART".to_string(),
        published_at,
        article_type: "disclosure".to_string(),
        source_type: "financial".to_string(),
        importance_weight: weight,
        sentiment_raw: Some(0.0),
        sentiment_label: Some("neutral".to_string()),
        sentiment_confidence: Some(1.0),
        scoring_method: Some("rule".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ty: &str, date: &str) -> ListItem {
        ListItem {
            report_nm: "주요사항보고서".to_string(),
            rcept_dt: date.to_string(),
            rcept_no: "20260301000123".to_string(),
            pblntf_ty: ty.to_string(),
        }
    }

    #[test]
    fn disclosures_are_pre_scored_neutral() {
        let article = normalize("005930", item("A", "20260301")).unwrap();
        assert_eq!(article.sentiment_raw, Some(0.0));
        assert_eq!(article.sentiment_confidence, Some(1.0));
        assert_eq!(article.scoring_method.as_deref(), Some("rule"));
        assert_eq!(article.article_type, "disclosure");
        assert_eq!(article.importance_weight, 2.0);
    }

    #[test]
    fn unknown_type_defaults_to_weight_one() {
        let article = normalize("005930", item("Z", "20260301")).unwrap();
        assert_eq!(article.importance_weight, 1.0);
    }

    #[test]
    fn bad_dates_are_dropped() {
        assert!(normalize("005930", item("A", "not-a-date")).is_none());
    }

    #[test]
    fn unconfigured_client_returns_empty() {
        let client = DisclosureClient::new(String::new());
        let rows =
            tokio_test::block_on(client.fetch_disclosures("005930", "20260201", "20260301"))
                .unwrap();
        assert!(rows.is_empty());
    }
}
