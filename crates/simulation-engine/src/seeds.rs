//! Deterministic RNG seeding.
//!
//! Every (ticker, model) pair gets its own SHA-256-derived seed so a model's
//! draws are reproducible and independent of which sibling models run in the
//! same ensemble. The single-model fast path seeds from the ticker alone.

use sha2::{Digest, Sha256};

/// 32-byte seed from `"{ticker}:{model}"`.
pub fn model_seed(ticker: &str, model: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(ticker.as_bytes());
    hasher.update(b":");
    hasher.update(model.as_bytes());
    hasher.finalize().into()
}

/// 32-byte seed from the ticker alone (single-model fast path).
pub fn ticker_seed(ticker: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(ticker.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_seed_is_stable() {
        assert_eq!(model_seed("005930", "gbm"), model_seed("005930", "gbm"));
    }

    #[test]
    fn model_seed_varies_by_ticker_and_model() {
        assert_ne!(model_seed("005930", "gbm"), model_seed("035420", "gbm"));
        assert_ne!(model_seed("005930", "gbm"), model_seed("005930", "garch"));
    }

    #[test]
    fn ticker_seed_differs_from_model_seed() {
        assert_ne!(ticker_seed("005930"), model_seed("005930", "gbm"));
    }
}
