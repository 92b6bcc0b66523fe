// tests/reward_flow.rs
//
// End-to-end reward path with test doubles for the evaluator collaborator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use sdg_label_engine::evaluator::CachingEvaluator;
use sdg_label_engine::{
    compute_xp, AccountKey, AnnotationEvaluator, AnnotationRequest, EngineConfig, EngineError,
    EvaluationScore, InMemoryLedger, LedgerStore, RewardAggregator, SdgLabel,
};

/// Counts calls; returns `score` or an error when `fail` is set.
struct CountingEvaluator {
    calls: AtomicUsize,
    score: EvaluationScore,
    fail: bool,
}

impl CountingEvaluator {
    fn ok(v: f64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            score: EvaluationScore {
                relevance: v,
                depth: v,
                correctness: v,
                creativity: v,
                semantic_score: v,
            },
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok(0.5)
        }
    }
}

#[async_trait]
impl AnnotationEvaluator for CountingEvaluator {
    async fn evaluate(&self, _request: &AnnotationRequest) -> sdg_label_engine::Result<EvaluationScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::external("upstream timeout"));
        }
        Ok(self.score)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

fn request(annotation: &str) -> AnnotationRequest {
    AnnotationRequest::new(
        "Community water boards cut cholera cases by half.",
        annotation,
        SdgLabel::goal(6).unwrap(),
    )
}

fn setup(ev: Arc<CountingEvaluator>) -> (RewardAggregator, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let agg = RewardAggregator::new(ev, ledger.clone(), &EngineConfig::default()).unwrap();
    (agg, ledger)
}

#[tokio::test]
async fn empty_comment_earns_zero_without_evaluation() {
    let ev = Arc::new(CountingEvaluator::ok(0.9));
    let (agg, ledger) = setup(ev.clone());

    let out = agg.reward_annotation("alice", &request("   ")).await.unwrap();
    assert_eq!(out.delta, 0);
    assert!(!out.written());
    assert_eq!(ev.calls.load(Ordering::SeqCst), 0);
    assert!(ledger.entries(&AccountKey::xp("alice")).is_empty());
}

#[tokio::test]
async fn quality_signal_point_eight_pays_eight_xp() {
    assert_eq!(compute_xp(0.8).unwrap(), 8);

    let ev = Arc::new(CountingEvaluator::ok(0.8));
    let (agg, ledger) = setup(ev.clone());
    let out = agg
        .reward_annotation("alice", &request("Links sanitation to clean water access."))
        .await
        .unwrap();

    assert_eq!(out.delta, 8);
    assert_eq!(ev.calls.load(Ordering::SeqCst), 1);
    let entries = ledger.entries(&AccountKey::xp("alice"));
    assert_eq!(entries.len(), 1);
    assert!(entries[0].reason.starts_with("annotation SDG6"));
}

#[tokio::test]
async fn failing_evaluator_leaves_ledger_unchanged() {
    let ev = Arc::new(CountingEvaluator::failing());
    let (agg, ledger) = setup(ev.clone());
    let acc = AccountKey::xp("bob");
    agg.apply_ledger_entry(&acc, 5, "seed").unwrap();

    let err = agg
        .reward_annotation("bob", &request("Water governance matters."))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExternalEvaluation(_)));
    assert_eq!(ev.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.running_total(&acc), 5);
    assert_eq!(ledger.entries(&acc).len(), 1);
}

#[tokio::test]
async fn cached_evaluator_grades_once_per_annotation() {
    let ledger = Arc::new(InMemoryLedger::new());
    let cached = Arc::new(CachingEvaluator::new(CountingEvaluator::ok(0.6), 16));
    let agg = RewardAggregator::new(cached.clone(), ledger.clone(), &EngineConfig::default())
        .unwrap();

    let req = request("Pipes and boards together.");
    for _ in 0..3 {
        agg.reward_annotation("carol", &req).await.unwrap();
    }
    assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
    // Caching avoids re-grading, not re-paying.
    assert_eq!(ledger.running_total(&AccountKey::xp("carol")), 18);
}

#[test]
fn label_rewards_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let ev = Arc::new(CountingEvaluator::ok(0.5));
    let (agg, ledger) = setup(ev);
    metrics::with_local_recorder(&recorder, || {
        agg.reward_label("dave", 8, 0.5, "label SDG6 on P1").unwrap();
        agg.reward_label("erin", 10, 0.9, "label SDG6 on P1").unwrap();
    });

    assert_eq!(ledger.running_total(&AccountKey::wallet("dave")), 35);
    assert_eq!(ledger.running_total(&AccountKey::wallet("erin")), 54);

    let scored = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(key, _, _, _)| key.key().name() == "label_quality_scores_total")
        .map(|(_, _, _, value)| value);
    assert_eq!(scored, Some(DebugValue::Counter(2)));
}

#[test]
fn zero_reward_weights_are_a_config_error_not_an_outage() {
    let mut cfg = EngineConfig::default();
    cfg.reward.llm_weight = 0.0;
    cfg.reward.semantic_weight = 0.0;

    let ev = Arc::new(CountingEvaluator::ok(0.8));
    let built = RewardAggregator::new(ev.clone(), Arc::new(InMemoryLedger::new()), &cfg);
    assert!(matches!(built, Err(EngineError::InvalidArgument(_))));
    assert_eq!(ev.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_account_is_rejected_before_grading() {
    let ev = Arc::new(CountingEvaluator::ok(0.8));
    let (agg, ledger) = setup(ev.clone());
    let err = agg
        .reward_annotation("", &request("Water boards and sanitation."))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert_eq!(ev.calls.load(Ordering::SeqCst), 0);
    assert!(ledger.accounts().is_empty());
}
