//! Local 3-class (negative / neutral / positive) news classifier.
//!
//! Stage 1 of the hybrid scoring pipeline: a Korean financial-news lexicon
//! produces per-class probabilities for every article in one batch. Articles
//! whose confidence stays under the configured threshold are escalated to the
//! LLM stage by the caller.

use lazy_static::lazy_static;
use serde::Serialize;

const POSITIVE_TERMS: &[&str] = &[
    "상승", "급등", "강세", "반등", "호조", "호재", "호실적", "흑자", "최대 실적",
    "신고가", "돌파", "수주", "성장", "개선", "확대", "상향", "매수", "기대",
    "사상 최대", "배당 확대", "자사주", "흑자 전환", "수출 증가", "점유율 확대",
];

const NEGATIVE_TERMS: &[&str] = &[
    "하락", "급락", "약세", "부진", "적자", "우려", "악재", "손실", "하향",
    "매도", "신저가", "리콜", "소송", "조사", "압수수색", "파산", "구조조정",
    "감원", "적자 전환", "수출 감소", "불매", "제재", "경고", "유상증자",
];

/// Phrases that flip the polarity of a nearby term ("하락 멈춤" is not bearish).
const NEGATION_TERMS: &[&str] = &["멈춤", "중단", "해소", "벗어나", "아니"];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClassifierScore {
    pub p_negative: f64,
    pub p_neutral: f64,
    pub p_positive: f64,
    /// P(pos) - P(neg), the continuous sentiment in [-1, +1].
    pub sentiment_raw: f64,
    /// max over the three class probabilities.
    pub confidence: f64,
    pub label: &'static str,
}

pub struct LexiconClassifier {
    positive: Vec<&'static str>,
    negative: Vec<&'static str>,
    negation: Vec<&'static str>,
}

lazy_static! {
    static ref CLASSIFIER: LexiconClassifier = LexiconClassifier::new();
}

/// The process-wide classifier instance, built on first use.
pub fn classifier() -> &'static LexiconClassifier {
    &CLASSIFIER
}

impl LexiconClassifier {
    fn new() -> Self {
        Self {
            positive: POSITIVE_TERMS.to_vec(),
            negative: NEGATIVE_TERMS.to_vec(),
            negation: NEGATION_TERMS.to_vec(),
        }
    }

    /// Score one text. Hit counts for each polarity are turned into class
    /// probabilities against a one-unit neutral prior, so a text with no
    /// lexicon hits is confidently neutral and a text with a single weak hit
    /// stays below typical escalation thresholds.
    pub fn score(&self, text: &str) -> ClassifierScore {
        let mut pos_hits = 0.0_f64;
        let mut neg_hits = 0.0_f64;

        for term in &self.positive {
            pos_hits += self.weighted_hits(text, term);
        }
        for term in &self.negative {
            neg_hits += self.weighted_hits(text, term);
        }

        // Negated polarity flips to the other side.
        let (pos, neg) = (pos_hits.max(0.0), neg_hits.max(0.0));

        let neutral_prior = 1.0;
        let total = pos + neg + neutral_prior;

        let p_positive = pos / total;
        let p_negative = neg / total;
        let p_neutral = neutral_prior / total;

        let label = if p_positive >= p_negative && p_positive >= p_neutral {
            "positive"
        } else if p_negative >= p_positive && p_negative >= p_neutral {
            "negative"
        } else {
            "neutral"
        };

        ClassifierScore {
            p_negative,
            p_neutral,
            p_positive,
            sentiment_raw: (p_positive - p_negative).clamp(-1.0, 1.0),
            confidence: p_positive.max(p_negative).max(p_neutral),
            label,
        }
    }

    /// Batch scoring; the whole stage-1 pass runs in one call.
    pub fn score_batch(&self, texts: &[String]) -> Vec<ClassifierScore> {
        texts.iter().map(|t| self.score(t)).collect()
    }

    /// Occurrences of `term` in `text`. An occurrence followed within a
    /// dozen Hangul syllables by a negation phrase counts as -1 instead of +1.
    fn weighted_hits(&self, text: &str, term: &str) -> f64 {
        let mut score = 0.0;
        for (idx, _) in text.match_indices(term) {
            let window_end = (idx + term.len() + 36).min(text.len());
            // Clamp to a char boundary for the lookahead window.
            let mut end = window_end;
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
            let after = &text[idx..end];
            let negated = self.negation.iter().any(|n| after.contains(n));
            score += if negated { -1.0 } else { 1.0 };
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_confident_neutral() {
        let score = classifier().score("");
        assert_eq!(score.label, "neutral");
        assert_eq!(score.confidence, 1.0);
        assert_eq!(score.sentiment_raw, 0.0);
    }

    #[test]
    fn positive_terms_push_positive() {
        let score = classifier().score("삼성전자 주가 급등, 사상 최대 실적에 신고가 돌파");
        assert_eq!(score.label, "positive");
        assert!(score.sentiment_raw > 0.0);
        assert!(score.p_positive > score.p_negative);
    }

    #[test]
    fn negative_terms_push_negative() {
        let score = classifier().score("실적 부진 우려에 급락, 적자 전환 소송 리스크");
        assert_eq!(score.label, "negative");
        assert!(score.sentiment_raw < 0.0);
    }

    #[test]
    fn single_hit_stays_below_escalation_threshold() {
        // One lexicon hit: p = 1/2, under the 0.70 escalation bar.
        let score = classifier().score("금일 시장 상승");
        assert!(score.confidence < 0.70);
    }

    #[test]
    fn many_hits_are_confident() {
        let score = classifier().score("급등 급등 상승 상승 호재 호실적 신고가 돌파");
        assert!(score.confidence >= 0.70);
        assert_eq!(score.label, "positive");
    }

    #[test]
    fn negation_flips_polarity() {
        let plain = classifier().score("주가 하락");
        let negated = classifier().score("주가 하락 멈춤");
        assert!(negated.sentiment_raw > plain.sentiment_raw);
    }

    #[test]
    fn probabilities_sum_to_one() {
        for text in ["", "상승", "하락 우려 급락", "무관한 기사 내용"] {
            let s = classifier().score(text);
            let total = s.p_negative + s.p_neutral + s.p_positive;
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn batch_matches_single() {
        let texts = vec!["급등".to_string(), "급락".to_string()];
        let batch = classifier().score_batch(&texts);
        assert_eq!(batch.len(), 2);
        assert!(batch[0].sentiment_raw > 0.0);
        assert!(batch[1].sentiment_raw < 0.0);
    }
}
