//! # Publication assessment
//! Pure logic that maps a publication's votes → scenario + per-label quality
//! weights. No I/O; reward payout and persistence happen in the caller.
//!
//! Once the vote threshold is met, every voted label gets a quality weight from
//! the scorer with `N` = votes for that label and `P_max` = the highest voter
//! confidence on it.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::scenario::{classify_publication, Classification, ScenarioType};
use crate::scoring::vote_count;
use crate::sdg::{max_confidence_by_label, tally, SdgLabel, VoteRecord};

/// Scorer output for one voted label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelWeight {
    pub label: SdgLabel,
    pub votes: usize,
    pub max_confidence: f64,
    pub quality: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicationAssessment {
    pub classification: Classification,
    /// Empty until the vote threshold is met. Ordered by votes desc, then label.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<LabelWeight>,
    /// Short human-readable explanation.
    pub reasons: Vec<String>,
}

impl PublicationAssessment {
    pub fn scenario(&self) -> ScenarioType {
        self.classification.scenario
    }

    /// Label with the most votes (lowest label id on ties).
    pub fn leading_label(&self) -> Option<SdgLabel> {
        self.weights.first().map(|w| w.label)
    }

    pub fn weight_for(&self, label: SdgLabel) -> Option<&LabelWeight> {
        self.weights.iter().find(|w| w.label == label)
    }
}

/// Assess a publication. `decided_label` comes from the external decision step.
pub fn assess(
    votes: &[VoteRecord],
    decided_label: Option<SdgLabel>,
    cfg: &EngineConfig,
) -> Result<PublicationAssessment> {
    let threshold = cfg.scenarios.votes_needed;
    let counts = tally(votes)?;
    let classification = classify_publication(&counts, threshold, decided_label, &cfg.scenarios)?;

    let mut reasons = vec![format!(
        "{} votes across {} labels (threshold {})",
        classification.total_votes,
        classification.group_sizes.len(),
        threshold
    )];

    if classification.scenario == ScenarioType::NotEnoughVotes {
        reasons.push(format!(
            "{} more votes needed",
            threshold - classification.total_votes
        ));
        return Ok(PublicationAssessment {
            classification,
            weights: Vec::new(),
            reasons,
        });
    }

    match (classification.scenario, classification.deviation) {
        (ScenarioType::Decided, _) => {
            if let Some(label) = decided_label {
                reasons.push(format!("decided externally as {label}"));
            }
        }
        (s, Some(dev)) => reasons.push(format!("matched {s} pattern (max deviation {dev:.2})")),
        (s, None) => reasons.push(format!("{s}: no configured pattern matched")),
    }

    let pmax = max_confidence_by_label(votes)?;
    let mut weights = counts
        .iter()
        .map(|(label, n)| {
            let p = pmax.get(label).copied().unwrap_or(0.0);
            let n_u32 = vote_count(*n)?;
            Ok(LabelWeight {
                label: *label,
                votes: *n,
                max_confidence: p,
                quality: cfg.scoring.score(n_u32, p)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    // counts is ordered by label, so a stable sort by votes keeps label order on ties.
    weights.sort_by(|a, b| b.votes.cmp(&a.votes));

    if let Some(top) = weights.first() {
        reasons.push(format!(
            "leading label {} with {} votes (quality {})",
            top.label, top.votes, top.quality
        ));
    }

    Ok(PublicationAssessment {
        classification,
        weights,
        reasons,
    })
}
