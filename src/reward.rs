//! # Reward aggregation
//! Turns label-quality scores into wallet coins and annotation evaluations into
//! XP, writing one ledger entry per reward.
//!
//! Either a fully computed delta is appended or nothing is written: the
//! evaluator runs before the ledger is touched, and any evaluator error aborts
//! the reward as-is (no retries, no partial credit).

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{EngineConfig, RewardConfig};
use crate::error::{EngineError, Result};
use crate::evaluator::{AnnotationRequest, DynEvaluator};
use crate::ledger::{AccountKey, LedgerEntry, LedgerStore};
use crate::scoring::ScoringParams;

/// XP for a quality signal in `[0, 1]`: `round(quality_signal * 10)`.
pub fn compute_xp(quality_signal: f64) -> Result<i64> {
    compute_xp_with(quality_signal, &RewardConfig::default())
}

pub fn compute_xp_with(quality_signal: f64, cfg: &RewardConfig) -> Result<i64> {
    if !quality_signal.is_finite() || !(0.0..=1.0).contains(&quality_signal) {
        return Err(EngineError::invalid(format!(
            "quality signal {quality_signal} outside [0, 1]"
        )));
    }
    Ok((quality_signal * cfg.xp_scale).round() as i64)
}

/// What a single reward call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardOutcome {
    pub account: AccountKey,
    pub delta: i64,
    /// Quality signal behind an XP reward, if an evaluation ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_signal: Option<f64>,
    /// Running total after the append; `None` when nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_total: Option<i64>,
}

impl RewardOutcome {
    pub fn written(&self) -> bool {
        self.new_total.is_some()
    }
}

pub struct RewardAggregator {
    evaluator: DynEvaluator,
    ledger: Arc<dyn LedgerStore>,
    scoring: ScoringParams,
    reward: RewardConfig,
}

impl RewardAggregator {
    /// Fails with `InvalidArgument` when the scoring or reward section is unusable.
    pub fn new(
        evaluator: DynEvaluator,
        ledger: Arc<dyn LedgerStore>,
        cfg: &EngineConfig,
    ) -> Result<Self> {
        cfg.scoring.validate()?;
        cfg.reward.validate()?;
        Ok(Self {
            evaluator,
            ledger,
            scoring: cfg.scoring,
            reward: cfg.reward,
        })
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Append one entry and return the new running total.
    pub fn apply_ledger_entry(
        &self,
        account: &AccountKey,
        delta: i64,
        reason: &str,
    ) -> Result<i64> {
        self.ledger
            .append(LedgerEntry::new(account.clone(), delta, reason))
    }

    /// Pay wallet coins for a label with `vote_count` votes and `max_confidence`.
    pub fn reward_label(
        &self,
        account_id: &str,
        vote_count: u32,
        max_confidence: f64,
        reason: &str,
    ) -> Result<RewardOutcome> {
        let coins = i64::from(self.scoring.score(vote_count, max_confidence)?);
        counter!("label_quality_scores_total").increment(1);

        let account = AccountKey::wallet(account_id);
        let total = self.apply_ledger_entry(&account, coins, reason)?;
        debug!(%account, coins, total, vote_count, "label reward paid");
        Ok(RewardOutcome {
            account,
            delta: coins,
            quality_signal: None,
            new_total: Some(total),
        })
    }

    /// Grade an annotation and pay XP.
    ///
    /// Blank annotations yield 0 XP without calling the evaluator and write
    /// nothing. Evaluator failures propagate as `ExternalEvaluation` and write
    /// nothing.
    pub async fn reward_annotation(
        &self,
        account_id: &str,
        request: &AnnotationRequest,
    ) -> Result<RewardOutcome> {
        if account_id.trim().is_empty() {
            return Err(EngineError::invalid("annotation reward needs an account id"));
        }
        let account = AccountKey::xp(account_id);
        if request.is_blank() {
            counter!("reward_evaluations_skipped_total").increment(1);
            return Ok(RewardOutcome {
                account,
                delta: 0,
                quality_signal: None,
                new_total: None,
            });
        }

        let id = request.fingerprint();
        let evaluated = self
            .evaluator
            .evaluate(request)
            .await
            .and_then(|score| score.validate().map(|()| score));
        let score = match evaluated {
            Ok(s) => s,
            Err(e) => {
                counter!("reward_evaluations_failed_total").increment(1);
                warn!(%id, evaluator = self.evaluator.name(), error = %e, "annotation evaluation failed");
                return Err(if matches!(e, EngineError::ExternalEvaluation(_)) {
                    e
                } else {
                    EngineError::external(e.to_string())
                });
            }
        };

        // Reward weight errors pass through as InvalidArgument.
        let quality = score.quality_signal(&self.reward)?;
        let xp = compute_xp_with(quality, &self.reward)?;
        let reason = format!("annotation {} ({})", request.target_label, id);
        let total = self.apply_ledger_entry(&account, xp, &reason)?;
        counter!("reward_xp_awarded_total").increment(xp.max(0) as u64);
        debug!(%account, %id, xp, quality, total, "annotation reward paid");

        Ok(RewardOutcome {
            account,
            delta: xp,
            quality_signal: Some(quality),
            new_total: Some(total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{DisabledEvaluator, FixedEvaluator};
    use crate::ledger::InMemoryLedger;
    use crate::sdg::SdgLabel;

    fn aggregator(evaluator: DynEvaluator) -> (RewardAggregator, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let agg = RewardAggregator::new(evaluator, ledger.clone(), &EngineConfig::default())
            .unwrap();
        (agg, ledger)
    }

    fn req(annotation: &str) -> AnnotationRequest {
        AnnotationRequest::new(
            "Solar microgrids bring affordable power to rural clinics.",
            annotation,
            SdgLabel::goal(7).unwrap(),
        )
    }

    #[test]
    fn compute_xp_rounds_scaled_signal() {
        assert_eq!(compute_xp(0.8).unwrap(), 8);
        assert_eq!(compute_xp(0.0).unwrap(), 0);
        assert_eq!(compute_xp(1.0).unwrap(), 10);
        assert_eq!(compute_xp(0.25).unwrap(), 3);
        assert!(matches!(
            compute_xp(1.01),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn annotation_reward_appends_xp() {
        let (agg, ledger) = aggregator(Arc::new(FixedEvaluator::uniform(0.8)));
        let out = agg.reward_annotation("u1", &req("affordable energy")).await.unwrap();
        assert_eq!(out.delta, 8);
        assert_eq!(out.new_total, Some(8));
        assert_eq!(ledger.running_total(&AccountKey::xp("u1")), 8);
        assert_eq!(ledger.running_total(&AccountKey::wallet("u1")), 0);
    }

    #[tokio::test]
    async fn evaluator_failure_writes_nothing() {
        let (agg, ledger) = aggregator(Arc::new(DisabledEvaluator));
        let err = agg.reward_annotation("u1", &req("affordable energy")).await.unwrap_err();
        assert!(matches!(err, EngineError::ExternalEvaluation(_)));
        assert!(ledger.entries(&AccountKey::xp("u1")).is_empty());
    }

    #[tokio::test]
    async fn out_of_range_evaluation_is_a_failure() {
        let (agg, ledger) = aggregator(Arc::new(FixedEvaluator::uniform(1.5)));
        let err = agg.reward_annotation("u1", &req("energy")).await.unwrap_err();
        assert!(matches!(err, EngineError::ExternalEvaluation(_)));
        assert_eq!(ledger.running_total(&AccountKey::xp("u1")), 0);
    }

    #[test]
    fn zero_reward_weights_are_rejected_up_front() {
        let mut cfg = EngineConfig::default();
        cfg.reward.llm_weight = 0.0;
        cfg.reward.semantic_weight = 0.0;
        let ledger = Arc::new(InMemoryLedger::new());
        let err = RewardAggregator::new(Arc::new(FixedEvaluator::uniform(0.8)), ledger, &cfg)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn blank_account_fails_before_evaluation() {
        let fixed = Arc::new(FixedEvaluator::uniform(0.8));
        let (agg, ledger) = aggregator(fixed.clone());
        let err = agg.reward_annotation("  ", &req("affordable energy")).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(fixed.calls(), 0);
        assert!(ledger.accounts().is_empty());
    }

    #[test]
    fn label_reward_pays_canonical_score() {
        let (agg, ledger) = aggregator(Arc::new(DisabledEvaluator));
        let out = agg.reward_label("u2", 10, 0.9, "label SDG7").unwrap();
        assert_eq!(out.delta, 54);
        assert_eq!(ledger.running_total(&AccountKey::wallet("u2")), 54);

        assert!(agg.reward_label("u2", 10, 2.0, "bad").is_err());
        assert_eq!(ledger.entries(&AccountKey::wallet("u2")).len(), 1);
    }

    #[test]
    fn apply_ledger_entry_returns_running_total() {
        let (agg, _ledger) = aggregator(Arc::new(DisabledEvaluator));
        let acc = AccountKey::wallet("u3");
        assert_eq!(agg.apply_ledger_entry(&acc, 10, "bonus").unwrap(), 10);
        assert_eq!(agg.apply_ledger_entry(&acc, -4, "correction").unwrap(), 6);
    }
}
