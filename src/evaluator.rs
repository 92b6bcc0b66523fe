//! Annotation evaluator: collaborator abstraction + in-memory cache.
//!
//! The real evaluator (LLM multi-dimension grading + semantic similarity) lives
//! outside this crate. Here we only define its contract, the quality-signal
//! blend, and the wrappers the reward path composes around it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{EvaluatorConfig, EvaluatorMode, RewardConfig};
use crate::error::{EngineError, Result};
use crate::sdg::SdgLabel;

/// What the evaluator grades: a user's annotation of a passage against a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRequest {
    /// Abstract section the annotation refers to.
    pub passage: String,
    /// The user's comment.
    pub annotation: String,
    pub target_label: SdgLabel,
}

impl AnnotationRequest {
    pub fn new(
        passage: impl Into<String>,
        annotation: impl Into<String>,
        target_label: SdgLabel,
    ) -> Self {
        Self {
            passage: passage.into(),
            annotation: annotation.into(),
            target_label,
        }
    }

    /// Nothing to grade: empty comment or empty passage.
    pub fn is_blank(&self) -> bool {
        self.annotation.trim().is_empty() || self.passage.trim().is_empty()
    }

    /// Stable key for caching and anonymized logging.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.passage.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.annotation.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.target_label.value().to_le_bytes());
        let digest = hasher.finalize();
        digest.iter().take(12).map(|b| format!("{b:02x}")).collect()
    }
}

/// Structured score returned by the evaluator. Every field in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    pub relevance: f64,
    pub depth: f64,
    pub correctness: f64,
    pub creativity: f64,
    pub semantic_score: f64,
}

impl EvaluationScore {
    /// Reject out-of-range or non-finite fields (unusable collaborator output).
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("relevance", self.relevance),
            ("depth", self.depth),
            ("correctness", self.correctness),
            ("creativity", self.creativity),
            ("semantic_score", self.semantic_score),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(EngineError::external(format!(
                    "evaluator returned {name} = {v}, expected [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Mean of the four LLM dimensions.
    pub fn llm_mean(&self) -> f64 {
        (self.relevance + self.depth + self.correctness + self.creativity) / 4.0
    }

    /// Weighted blend of LLM mean and semantic similarity, in `[0, 1]`.
    pub fn quality_signal(&self, cfg: &RewardConfig) -> Result<f64> {
        self.validate()?;
        let denom = cfg.llm_weight + cfg.semantic_weight;
        if denom.is_nan() || denom <= 0.0 {
            return Err(EngineError::invalid(
                "reward.llm_weight + reward.semantic_weight must be > 0",
            ));
        }
        let q = (cfg.llm_weight * self.llm_mean() + cfg.semantic_weight * self.semantic_score)
            / denom;
        Ok(q.clamp(0.0, 1.0))
    }
}

/// Collaborator contract. Implementations must be deterministic enough that a
/// fixed-value double is a valid substitute.
#[async_trait]
pub trait AnnotationEvaluator: Send + Sync {
    async fn evaluate(&self, request: &AnnotationRequest) -> Result<EvaluationScore>;
    /// Name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynEvaluator = Arc<dyn AnnotationEvaluator>;

/// Factory: build an evaluator from config.
///
/// * `disabled` → every evaluation fails (rewards are reported, not zeroed).
/// * `fixed` → deterministic stand-in returning `fixed_score`.
///
/// A non-zero `cache_capacity` wraps the evaluator in a [`CachingEvaluator`].
pub fn build_evaluator(cfg: &EvaluatorConfig) -> DynEvaluator {
    match (cfg.mode, cfg.fixed_score) {
        (EvaluatorMode::Fixed, Some(score)) => {
            let fixed = FixedEvaluator::new(score);
            if cfg.cache_capacity > 0 {
                Arc::new(CachingEvaluator::new(fixed, cfg.cache_capacity))
            } else {
                Arc::new(fixed)
            }
        }
        _ => Arc::new(DisabledEvaluator),
    }
}

/// Returns the same score for every request and counts calls.
#[derive(Debug)]
pub struct FixedEvaluator {
    score: EvaluationScore,
    calls: AtomicUsize,
}

impl FixedEvaluator {
    pub fn new(score: EvaluationScore) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
        }
    }

    /// All five fields set to `v`.
    pub fn uniform(v: f64) -> Self {
        Self::new(EvaluationScore {
            relevance: v,
            depth: v,
            correctness: v,
            creativity: v,
            semantic_score: v,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnotationEvaluator for FixedEvaluator {
    async fn evaluate(&self, _request: &AnnotationRequest) -> Result<EvaluationScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.score)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Always fails; used when no evaluator is configured.
#[derive(Debug, Default)]
pub struct DisabledEvaluator;

#[async_trait]
impl AnnotationEvaluator for DisabledEvaluator {
    async fn evaluate(&self, _request: &AnnotationRequest) -> Result<EvaluationScore> {
        Err(EngineError::external("annotation evaluator is disabled"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Memoizes successful evaluations by request fingerprint. Failures pass
/// through and are never cached.
pub struct CachingEvaluator<E: AnnotationEvaluator> {
    inner: E,
    cache: Mutex<HashMap<String, EvaluationScore>>,
    capacity: usize,
}

impl<E: AnnotationEvaluator> CachingEvaluator<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.cache.lock().expect("evaluator cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E: AnnotationEvaluator> AnnotationEvaluator for CachingEvaluator<E> {
    async fn evaluate(&self, request: &AnnotationRequest) -> Result<EvaluationScore> {
        let key = request.fingerprint();
        {
            let cache = self.cache.lock().expect("evaluator cache mutex poisoned");
            if let Some(hit) = cache.get(&key) {
                counter!("evaluator_cache_hits_total").increment(1);
                debug!(id = %key, "evaluator cache hit");
                return Ok(*hit);
            }
        }

        counter!("evaluator_cache_misses_total").increment(1);
        let fresh = self.inner.evaluate(request).await?;
        fresh.validate()?;

        let mut cache = self.cache.lock().expect("evaluator cache mutex poisoned");
        if cache.len() >= self.capacity {
            // Simple bound: start over rather than track recency.
            cache.clear();
        }
        cache.insert(key, fresh);
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
