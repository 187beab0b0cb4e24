//! HTTP clients for the news sentiment stage: news search, disclosure list,
//! and the LLM escalation API. All clients retry transient failures with
//! exponential backoff and apply per-request timeouts.

pub mod dart;
pub mod llm;
pub mod naver;

pub use dart::DisclosureClient;
pub use llm::{LlmBatchOutcome, LlmClient, LlmScore};
pub use naver::NewsSearchClient;

use analysis_core::NewsArticle;

/// Strip HTML tags and decode the entities the search API embeds in titles.
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

/// Financial-press domains carry a higher source weight downstream.
const FINANCIAL_DOMAINS: [&str; 8] = [
    "hankyung.com",
    "mk.co.kr",
    "edaily.co.kr",
    "mt.co.kr",
    "sedaily.com",
    "fnnews.com",
    "thebell.co.kr",
    "businesspost.co.kr",
];

/// Classify a source URL into financial / portal / general.
pub fn classify_source(url: &str) -> &'static str {
    if url.is_empty() {
        return "general";
    }
    let url_lower = url.to_lowercase();
    if FINANCIAL_DOMAINS.iter().any(|d| url_lower.contains(d)) {
        return "financial";
    }
    if url_lower.contains("blog") || url_lower.contains("cafe") || url_lower.contains("community") {
        return "portal";
    }
    "general"
}

/// Classify an article into earnings / analyst / disclosure / general from
/// title and description keywords.
pub fn classify_article_type(title: &str, description: &str) -> &'static str {
    let text = format!("{title} {description}");
    const EARNINGS: [&str; 6] = ["실적", "영업이익", "매출", "순이익", "어닝", "분기"];
    const ANALYST: [&str; 5] = ["리포트", "목표가", "투자의견", "증권사", "애널리스트"];
    const DISCLOSURE: [&str; 4] = ["공시", "보고서", "감사", "신고"];

    if EARNINGS.iter().any(|kw| text.contains(kw)) {
        return "earnings";
    }
    if ANALYST.iter().any(|kw| text.contains(kw)) {
        return "analyst";
    }
    if DISCLOSURE.iter().any(|kw| text.contains(kw)) {
        return "disclosure";
    }
    "general"
}

/// Domain part of a URL, for the source-name column.
pub fn extract_domain(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let domain = stripped.split('/').next().unwrap_or("");
    if domain.is_empty() {
        "unknown".to_string()
    } else {
        domain.to_string()
    }
}

/// Drop duplicate articles for one ticker, keyed by source URL.
pub fn dedupe_by_url(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(articles.len());
    for article in articles {
        if !article.source_url.is_empty() && !seen.insert(article.source_url.clone()) {
            continue;
        }
        unique.push(article);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn strips_tags_and_entities() {
        assert_eq!(strip_html("<b>삼성전자</b> 실적 &quot;서프라이즈&quot;"), "삼성전자 실적 \"서프라이즈\"");
        assert_eq!(strip_html("plain text"), "plain text");
    }

    #[test]
    fn classifies_sources() {
        assert_eq!(classify_source("https://www.hankyung.com/article/1"), "financial");
        assert_eq!(classify_source("https://blog.example.com/post"), "portal");
        assert_eq!(classify_source("https://news.example.com/a"), "general");
        assert_eq!(classify_source(""), "general");
    }

    #[test]
    fn classifies_article_types() {
        assert_eq!(classify_article_type("3분기 영업이익 급증", ""), "earnings");
        assert_eq!(classify_article_type("증권사 목표가 상향", ""), "analyst");
        assert_eq!(classify_article_type("주요사항 공시", ""), "disclosure");
        assert_eq!(classify_article_type("신제품 출시", ""), "general");
    }

    #[test]
    fn earnings_keywords_win_over_analyst() {
        assert_eq!(classify_article_type("실적 리포트", ""), "earnings");
    }

    #[test]
    fn extracts_domains() {
        assert_eq!(extract_domain("https://www.mk.co.kr/news/1"), "www.mk.co.kr");
        assert_eq!(extract_domain(""), "unknown");
    }

    fn article(url: &str) -> NewsArticle {
        NewsArticle {
            ticker: "005930".to_string(),
            title: "t".to_string(),
            description: None,
            source_url: url.to_string(),
            source_name: "s".to_string(),
            published_at: Utc::now(),
            article_type: "general".to_string(),
            source_type: "general".to_string(),
            importance_weight: 1.0,
            sentiment_raw: None,
            sentiment_label: None,
            sentiment_confidence: None,
            scoring_method: None,
        }
    }

    #[test]
    fn dedupes_by_url_keeping_first() {
        let articles = vec![article("https://a"), article("https://a"), article("https://b")];
        let unique = dedupe_by_url(articles);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn empty_urls_are_not_deduped() {
        let articles = vec![article(""), article("")];
        assert_eq!(dedupe_by_url(articles).len(), 2);
    }
}
