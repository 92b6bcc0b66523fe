// src/lib.rs
//! Label consensus & reward scoring engine for crowdsourced SDG labeling.
//!
//! Pipeline: votes → [`scenario`] classification → [`scoring`] quality weight per
//! label → [`reward`] coins/XP appended to the [`ledger`]. Independently,
//! [`distribution`] metrics over model predictions feed [`ranking`] for
//! active-learning publication selection.

pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod ledger;
pub mod ranking;
pub mod reward;
pub mod scenario;
pub mod scoring;
pub mod sdg;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::{EngineConfig, HotReloadConfig, RewardConfig};
pub use crate::distribution::{entropy, stddev, PredictionVector};
pub use crate::engine::{assess, LabelWeight, PublicationAssessment};
pub use crate::error::{EngineError, Result};
pub use crate::evaluator::{AnnotationEvaluator, AnnotationRequest, EvaluationScore};
pub use crate::ledger::{AccountKey, InMemoryLedger, LedgerEntry, LedgerKind, LedgerStore};
pub use crate::ranking::{top_n, RankMetric, RankOrder, RankedPublication};
pub use crate::reward::{compute_xp, RewardAggregator, RewardOutcome};
pub use crate::scenario::{classify, ScenarioConfig, ScenarioType};
pub use crate::scoring::{score, ScoringParams};
pub use crate::sdg::{SdgLabel, VoteRecord};
