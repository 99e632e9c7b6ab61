// src/evaluator/similarity.rs — Embedding cosine similarity against a reference text

use async_trait::async_trait;

use super::{EvalContext, EvalResult, Evaluator};
use crate::infra::errors::ProbeError;

/// Cosine similarity between two vectors.
///
/// `None` when the vectors differ in length, are empty, or one has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a * norm_b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

/// Embeds the output and a comparison string, then compares their cosine
/// similarity with `threshold` (strictly above or below).
#[derive(Debug, Clone)]
pub struct CosineSimilarity {
    comparison: String,
    threshold: f64,
    direction: Direction,
}

impl CosineSimilarity {
    pub fn above(comparison: impl Into<String>, threshold: f64) -> Self {
        Self {
            comparison: comparison.into(),
            threshold,
            direction: Direction::Above,
        }
    }

    pub fn below(comparison: impl Into<String>, threshold: f64) -> Self {
        Self {
            comparison: comparison.into(),
            threshold,
            direction: Direction::Below,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[async_trait]
impl Evaluator for CosineSimilarity {
    fn name(&self) -> &str {
        match self.direction {
            Direction::Above => "cosine_similarity_above_threshold",
            Direction::Below => "cosine_similarity_below_threshold",
        }
    }

    async fn evaluate(&self, output: &str, ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        let vectors = ctx
            .embed(self.name(), &[output, self.comparison.as_str()])
            .await?;
        let [a, b] = vectors.as_slice() else {
            return Err(ProbeError::evaluator(
                self.name(),
                format!("expected 2 embeddings, got {}", vectors.len()),
            ));
        };
        let score = cosine_similarity(a, b).ok_or_else(|| {
            ProbeError::evaluator(self.name(), "embeddings are empty or of different sizes")
        })?;

        let (passed, relation) = match self.direction {
            Direction::Above => (score > self.threshold, "above"),
            Direction::Below => (score < self.threshold, "below"),
        };
        let verdict = if passed { "is" } else { "is not" };
        Ok(EvalResult::from_verdict(
            passed,
            format!(
                "cosine similarity {score:.4} {verdict} {relation} threshold {}",
                self.threshold
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::StaticProvider;
    use std::sync::Arc;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).is_none());
    }

    fn ctx() -> EvalContext {
        let provider = StaticProvider::replying("")
            .with_embedding("Bonjour", vec![1.0, 0.0])
            .with_embedding("Salut", vec![0.8, 0.6])
            .with_embedding("Goodbye", vec![0.0, 1.0]);
        EvalContext::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_above_threshold() {
        let eval = CosineSimilarity::above("Salut", 0.7);
        let r = eval.evaluate("Bonjour", &ctx()).await.unwrap();
        assert_eq!(r.passed, Some(true));
        assert!(r.reason.contains("0.8000"));
    }

    #[tokio::test]
    async fn test_below_threshold() {
        let eval = CosineSimilarity::below("Goodbye", 0.2);
        assert_eq!(
            eval.evaluate("Bonjour", &ctx()).await.unwrap().passed,
            Some(true)
        );
        let eval = CosineSimilarity::below("Salut", 0.2);
        assert_eq!(
            eval.evaluate("Bonjour", &ctx()).await.unwrap().passed,
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_embedding_failure_is_error() {
        let eval = CosineSimilarity::above("unknown", 0.5);
        assert!(eval.evaluate("Bonjour", &ctx()).await.is_err());
    }
}
