//! News sentiment stage.
//!
//! Fetches news and disclosures per ticker under a bounded semaphore,
//! scores articles with the two-stage classifier (local lexicon, then LLM
//! escalation for low-confidence results), and aggregates per-ticker
//! sentiment snapshots plus the lookup tables the composite and simulation
//! stages consume.

use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::{EngineConfig, NewsArticle, NewsSnapshot};
use chrono::{Duration, NaiveDate, Utc};
use news_client::{DisclosureClient, LlmClient, NewsSearchClient};
use sentiment_analysis::{
    classifier, compute_sentiment_adjustments, compute_sentiment_score, AdjustmentParams,
    SentimentAdjustments,
};
use serde_json::json;
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
pub struct NewsStageOutput {
    /// All scored articles, for the idempotent article upsert.
    pub articles: Vec<NewsArticle>,
    /// Per-ticker snapshots; no-data tickers are skipped to save space.
    pub snapshots: Vec<NewsSnapshot>,
    /// Composite-axis input: sentiment score for tickers with active status.
    pub composite_inputs: HashMap<String, f64>,
    /// Simulation parameter adjustments for tickers with active status.
    pub sim_adjustments: HashMap<String, SentimentAdjustments>,
}

pub struct NewsStage {
    search: NewsSearchClient,
    disclosure: DisclosureClient,
    llm: LlmClient,
    config: EngineConfig,
}

impl NewsStage {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            search: NewsSearchClient::new(
                config.naver_client_id.clone(),
                config.naver_client_secret.clone(),
            ),
            disclosure: DisclosureClient::new(config.dart_api_key.clone()),
            llm: LlmClient::new(config.anthropic_api_key.clone()),
            config: config.clone(),
        }
    }

    /// Run the full stage for the universe. External failures degrade to
    /// no-data per ticker; the stage itself only fails on task-join errors.
    pub async fn run(
        &self,
        target_date: NaiveDate,
        tickers: &[(String, String)],
    ) -> NewsStageOutput {
        let mut articles = self.fetch_all(tickers).await;

        self.score_articles(&mut articles).await;

        self.aggregate(target_date, tickers, articles)
    }

    /// Fetch both source classes for every ticker under the concurrency cap,
    /// with a minimum inter-request spacing for the external rate limits.
    async fn fetch_all(&self, tickers: &[(String, String)]) -> Vec<NewsArticle> {
        let semaphore = Arc::new(Semaphore::new(self.config.news_concurrency));
        let mut handles = Vec::with_capacity(tickers.len());

        let end = Utc::now();
        let start = end - Duration::days(self.config.news_lookback_days);
        let begin_date = start.format("%Y%m%d").to_string();
        let end_date = end.format("%Y%m%d").to_string();

        for (ticker, name) in tickers.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let search = self.search.clone();
            let disclosure = self.disclosure.clone();
            let begin_date = begin_date.clone();
            let end_date = end_date.clone();
            let delay = std::time::Duration::from_millis(self.config.news_request_delay_ms);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;

                let news = match search.fetch_news(&ticker, &name, 100).await {
                    Ok(articles) => articles,
                    Err(e) => {
                        tracing::warn!("news fetch failed for {}: {}", ticker, e);
                        Vec::new()
                    }
                };
                tokio::time::sleep(delay).await;

                let disclosures = match disclosure
                    .fetch_disclosures(&ticker, &begin_date, &end_date)
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!("disclosure fetch failed for {}: {}", ticker, e);
                        Vec::new()
                    }
                };
                tokio::time::sleep(delay).await;

                let cutoff = start;
                let mut combined: Vec<NewsArticle> = news
                    .into_iter()
                    .filter(|a| a.published_at >= cutoff)
                    .collect();
                combined.extend(disclosures);

                Some(news_client::dedupe_by_url(combined))
            }));
        }

        let mut articles = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(batch)) => articles.extend(batch),
                Ok(None) => {}
                Err(e) => tracing::warn!("news fetch task failed: {}", e),
            }
        }

        tracing::info!("news stage: {} articles fetched", articles.len());
        articles
    }

    /// Two-stage scoring. Stage 1 batch-classifies everything that is not
    /// pre-scored; stage 2 escalates the lowest-confidence results to the
    /// LLM, capped and via either the concurrent or the batched path.
    async fn score_articles(&self, articles: &mut [NewsArticle]) {
        let unscored: Vec<usize> = articles
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_pre_scored())
            .map(|(i, _)| i)
            .collect();

        if unscored.is_empty() {
            return;
        }

        // Stage 1: local classifier, one batch.
        let texts: Vec<String> = unscored
            .iter()
            .map(|&i| articles[i].scoring_text())
            .collect();
        let scores = classifier().score_batch(&texts);

        for (&idx, score) in unscored.iter().zip(scores.iter()) {
            let article = &mut articles[idx];
            article.sentiment_raw = Some(score.sentiment_raw);
            article.sentiment_label = Some(score.label.to_string());
            article.sentiment_confidence = Some(score.confidence);
            article.scoring_method = Some("lexicon".to_string());
        }

        // Stage 2: LLM escalation, lowest confidence first.
        if !self.llm.is_configured() {
            return;
        }

        let mut escalation: Vec<usize> = unscored
            .iter()
            .copied()
            .filter(|&i| {
                articles[i].sentiment_confidence.unwrap_or(0.0)
                    < self.config.classifier_confidence_threshold
            })
            .collect();
        escalation.sort_by(|&a, &b| {
            let ca = articles[a].sentiment_confidence.unwrap_or(0.0);
            let cb = articles[b].sentiment_confidence.unwrap_or(0.0);
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });
        escalation.truncate(self.config.llm_max_escalations);

        if escalation.is_empty() {
            return;
        }

        tracing::info!(
            "news stage: escalating {} low-confidence articles to LLM ({})",
            escalation.len(),
            if self.config.llm_batch_mode { "batch" } else { "concurrent" }
        );

        if self.config.llm_batch_mode {
            self.escalate_batched(articles, &escalation).await;
        } else {
            self.escalate_concurrent(articles, &escalation).await;
        }
    }

    async fn escalate_concurrent(&self, articles: &mut [NewsArticle], escalation: &[usize]) {
        let semaphore = Arc::new(Semaphore::new(self.config.llm_concurrency));
        let mut handles = Vec::with_capacity(escalation.len());

        for &idx in escalation {
            let llm = self.llm.clone();
            let semaphore = Arc::clone(&semaphore);
            let ticker = articles[idx].ticker.clone();
            let text = articles[idx].scoring_text();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match llm.score_article(&ticker, &text).await {
                    Ok(score) => Some((idx, score)),
                    Err(e) => {
                        tracing::debug!("LLM escalation failed for {}: {}", ticker, e);
                        None
                    }
                }
            }));
        }

        for handle in handles {
            if let Ok(Some((idx, score))) = handle.await {
                let article = &mut articles[idx];
                article.sentiment_raw = Some(score.sentiment_raw);
                article.sentiment_label = Some(score.sentiment_label);
                article.sentiment_confidence = Some(score.sentiment_confidence);
                article.scoring_method = Some("llm".to_string());
            }
        }
    }

    async fn escalate_batched(&self, articles: &mut [NewsArticle], escalation: &[usize]) {
        let items: Vec<(String, String, String)> = escalation
            .iter()
            .map(|&idx| {
                (
                    idx.to_string(),
                    articles[idx].ticker.clone(),
                    articles[idx].scoring_text(),
                )
            })
            .collect();

        let ceiling = std::time::Duration::from_secs(self.config.llm_batch_poll_ceiling_secs);
        match self.llm.score_batch(&items, ceiling).await {
            Ok(outcome) => {
                for (custom_id, score) in outcome.scores {
                    let Ok(idx) = custom_id.parse::<usize>() else {
                        continue;
                    };
                    let Some(article) = articles.get_mut(idx) else {
                        continue;
                    };
                    article.sentiment_raw = Some(score.sentiment_raw);
                    article.sentiment_label = Some(score.sentiment_label);
                    article.sentiment_confidence = Some(score.sentiment_confidence);
                    article.scoring_method = Some("llm".to_string());
                }
            }
            Err(e) => {
                // Items keep their stage-1 scores.
                tracing::warn!("LLM batch escalation failed: {}", e);
            }
        }
    }

    fn aggregate(
        &self,
        target_date: NaiveDate,
        tickers: &[(String, String)],
        articles: Vec<NewsArticle>,
    ) -> NewsStageOutput {
        let mut by_ticker: HashMap<&str, Vec<&NewsArticle>> = HashMap::new();
        for article in &articles {
            by_ticker.entry(&article.ticker).or_default().push(article);
        }

        let params = AdjustmentParams {
            alpha: self.config.sentiment_alpha,
            beta: self.config.sentiment_beta,
            delta: self.config.sentiment_delta,
            gamma_lambda: self.config.sentiment_gamma_lambda,
            gamma_mu: self.config.sentiment_gamma_mu,
        };

        let mut output = NewsStageOutput::default();

        for (ticker, _) in tickers {
            let ticker_articles: Vec<NewsArticle> = by_ticker
                .get(ticker.as_str())
                .map(|list| list.iter().map(|a| (*a).clone()).collect())
                .unwrap_or_default();

            let score = compute_sentiment_score(
                &ticker_articles,
                self.config.news_half_life_days,
                self.config.news_min_articles,
            );

            if score.status == "no_data" {
                continue;
            }

            let mut source_counts: HashMap<&str, usize> = HashMap::new();
            for article in &ticker_articles {
                *source_counts.entry(article.source_type.as_str()).or_insert(0) += 1;
            }

            output.snapshots.push(NewsSnapshot {
                trade_date: target_date,
                ticker: ticker.clone(),
                sentiment_score: score.sentiment_score,
                direction: score.direction,
                intensity: score.intensity,
                confidence: score.confidence,
                effective_score: score.effective_score,
                sentiment_signal: score.signal.to_string(),
                article_count: score.article_count as i32,
                status: score.status.to_string(),
                source_breakdown: json!(source_counts),
            });

            if score.is_active() {
                output.composite_inputs.insert(ticker.clone(), score.sentiment_score);
                output
                    .sim_adjustments
                    .insert(ticker.clone(), compute_sentiment_adjustments(&score, &params));
            }
        }

        output.articles = articles;
        tracing::info!(
            "news stage: {} snapshots, {} active tickers",
            output.snapshots.len(),
            output.composite_inputs.len()
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig {
            database_url: "postgres://test".to_string(),
            risk_free_rate: 0.035,
            equity_risk_premium: 0.065,
            whale_lookback_days: 20,
            num_simulations: 100,
            sim_workers: 1,
            min_history_days: 60,
            max_annualized_sigma: 1.50,
            weight_gbm: 0.25,
            weight_garch: 0.30,
            weight_heston: 0.20,
            weight_merton: 0.25,
            garch_p: 1,
            garch_q: 1,
            heston_kappa: 2.0,
            heston_theta: 0.04,
            heston_xi: 0.3,
            heston_rho: -0.7,
            merton_lambda: 3.0,
            merton_mu_j: 0.0,
            merton_sigma_j: 0.06,
            news_enabled: true,
            news_concurrency: 3,
            news_request_delay_ms: 0,
            news_lookback_days: 14,
            news_half_life_days: 3.0,
            news_min_articles: 2,
            sentiment_alpha: 0.08,
            sentiment_beta: 0.15,
            sentiment_delta: 0.50,
            sentiment_gamma_lambda: 1.50,
            sentiment_gamma_mu: 0.03,
            classifier_confidence_threshold: 0.70,
            llm_batch_mode: false,
            llm_max_escalations: 200,
            llm_concurrency: 3,
            llm_batch_poll_ceiling_secs: 1800,
            naver_client_id: String::new(),
            naver_client_secret: String::new(),
            dart_api_key: String::new(),
            anthropic_api_key: String::new(),
            api_bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    fn scored_article(ticker: &str, sentiment: f64, url: &str) -> NewsArticle {
        NewsArticle {
            ticker: ticker.to_string(),
            title: "기사".to_string(),
            description: None,
            source_url: url.to_string(),
            source_name: "example".to_string(),
            published_at: Utc::now(),
            article_type: "general".to_string(),
            source_type: "general".to_string(),
            importance_weight: 1.0,
            sentiment_raw: Some(sentiment),
            sentiment_label: Some("positive".to_string()),
            sentiment_confidence: Some(0.9),
            scoring_method: Some("lexicon".to_string()),
        }
    }

    #[test]
    fn aggregate_skips_tickers_without_articles() {
        let stage = NewsStage::new(&test_config());
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let tickers = vec![
            ("005930".to_string(), "삼성전자".to_string()),
            ("000660".to_string(), "SK하이닉스".to_string()),
        ];
        let articles = vec![
            scored_article("005930", 0.6, "https://a/1"),
            scored_article("005930", 0.6, "https://a/2"),
            scored_article("005930", 0.6, "https://a/3"),
        ];

        let output = stage.aggregate(date, &tickers, articles);

        // No-data ticker produces no snapshot; the active one feeds both
        // downstream lookup tables.
        assert_eq!(output.snapshots.len(), 1);
        assert_eq!(output.snapshots[0].ticker, "005930");
        assert_eq!(output.snapshots[0].status, "active");
        assert!(output.composite_inputs.contains_key("005930"));
        assert!(output.sim_adjustments.contains_key("005930"));
        assert!(!output.composite_inputs.contains_key("000660"));
    }

    #[test]
    fn aggregate_insufficient_is_persisted_but_not_forwarded() {
        let stage = NewsStage::new(&test_config());
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let tickers = vec![("005930".to_string(), "삼성전자".to_string())];
        let articles = vec![scored_article("005930", 0.6, "https://a/1")];

        let output = stage.aggregate(date, &tickers, articles);

        assert_eq!(output.snapshots.len(), 1);
        assert_eq!(output.snapshots[0].status, "insufficient");
        assert!(output.composite_inputs.is_empty());
        assert!(output.sim_adjustments.is_empty());
    }

    #[test]
    fn aggregate_counts_sources() {
        let stage = NewsStage::new(&test_config());
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let tickers = vec![("005930".to_string(), "삼성전자".to_string())];
        let mut articles = vec![
            scored_article("005930", 0.5, "https://a/1"),
            scored_article("005930", 0.5, "https://a/2"),
        ];
        articles[1].source_type = "financial".to_string();

        let output = stage.aggregate(date, &tickers, articles);
        let breakdown = &output.snapshots[0].source_breakdown;
        assert_eq!(breakdown["general"], 1);
        assert_eq!(breakdown["financial"], 1);
    }
}
