//! # Scenario classification
//! Recomputes a publication's consensus scenario from its current vote tally.
//!
//! Shape scenarios (`Confirm`, `Tiebreaker`, `Investigate`, `Explore`) come
//! from configured distribution patterns matched against the sorted group
//! sizes. `Decided` is never inferred from votes; it is only returned when the
//! caller passes an externally decided label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::sdg::{LabelCounts, SdgLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    Confirm,
    Tiebreaker,
    Investigate,
    Explore,
    NotEnoughVotes,
    NoSpecificScenario,
    Decided,
}

impl ScenarioType {
    /// Scenarios that may be produced by a distribution pattern.
    pub fn is_shape(self) -> bool {
        matches!(
            self,
            Self::Confirm | Self::Tiebreaker | Self::Investigate | Self::Explore
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "CONFIRM",
            Self::Tiebreaker => "TIEBREAKER",
            Self::Investigate => "INVESTIGATE",
            Self::Explore => "EXPLORE",
            Self::NotEnoughVotes => "NOT_ENOUGH_VOTES",
            Self::NoSpecificScenario => "NO_SPECIFIC_SCENARIO",
            Self::Decided => "DECIDED",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group-size shape, e.g. `[6, 4]` or `[3, 3, 3, 1]`.
///
/// Sizes are reference counts; matching compares vote *shares*
/// (`size / sum(sizes)` vs `count / total_votes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionPattern {
    pub scenario: ScenarioType,
    pub sizes: Vec<u32>,
}

impl DistributionPattern {
    pub fn new(scenario: ScenarioType, sizes: &[u32]) -> Self {
        Self {
            scenario,
            sizes: sizes.to_vec(),
        }
    }

    fn shares(&self) -> Vec<f64> {
        let mut sizes = self.sizes.clone();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        let sum: u32 = sizes.iter().sum();
        sizes
            .into_iter()
            .map(|s| f64::from(s) / f64::from(sum))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if !self.scenario.is_shape() {
            return Err(EngineError::invalid(format!(
                "{} cannot be produced by a distribution pattern",
                self.scenario
            )));
        }
        if self.sizes.is_empty() || self.sizes.iter().any(|s| *s == 0) {
            return Err(EngineError::invalid(format!(
                "{} pattern needs non-empty, positive group sizes",
                self.scenario
            )));
        }
        Ok(())
    }
}

/// How to choose between several matching patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Fewer distinct groups wins, then closest fit, then declaration order.
    #[default]
    FewestGroups,
    /// Smallest maximum share deviation wins, then declaration order.
    ClosestFit,
    /// First declared matching pattern wins.
    DeclarationOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Votes required before any shape scenario applies.
    pub votes_needed: usize,
    /// Max absolute share deviation per group for a pattern to match.
    pub tolerance: f64,
    /// Max combined share of groups beyond the pattern's length.
    pub residual_tolerance: f64,
    pub tie_break: TieBreak,
    /// When true, a single-label tally at/above threshold is `Confirm`.
    pub unanimous_confirms: bool,
    pub patterns: Vec<DistributionPattern>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            votes_needed: 10,
            tolerance: 0.05,
            residual_tolerance: 0.0,
            tie_break: TieBreak::FewestGroups,
            unanimous_confirms: false,
            patterns: vec![
                DistributionPattern::new(ScenarioType::Confirm, &[6, 4]),
                DistributionPattern::new(ScenarioType::Tiebreaker, &[5, 5]),
                DistributionPattern::new(ScenarioType::Investigate, &[3, 3, 3, 1]),
                DistributionPattern::new(ScenarioType::Explore, &[1, 2, 2, 2, 1, 1, 1]),
            ],
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("tolerance", self.tolerance),
            ("residual_tolerance", self.residual_tolerance),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(EngineError::invalid(format!(
                    "scenarios.{name} = {v} outside [0, 1]"
                )));
            }
        }
        self.patterns.iter().try_for_each(DistributionPattern::validate)
    }
}

/// Classification result with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub scenario: ScenarioType,
    pub total_votes: usize,
    /// Group sizes, descending.
    pub group_sizes: Vec<usize>,
    /// Max share deviation of the matched pattern, if one matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
}

/// Scenario for a vote tally using the configured patterns.
pub fn classify(
    counts: &LabelCounts,
    votes_needed: usize,
    cfg: &ScenarioConfig,
) -> Result<ScenarioType> {
    Ok(classify_detailed(counts, votes_needed, cfg)?.scenario)
}

/// Like [`classify`], but honours an externally decided label first.
///
/// `decided_label` is whatever the decision workflow stored; `None`,
/// `NOT_DEFINED` and `UNDEFINED` (0) mean "not decided".
pub fn classify_publication(
    counts: &LabelCounts,
    votes_needed: usize,
    decided_label: Option<SdgLabel>,
    cfg: &ScenarioConfig,
) -> Result<Classification> {
    if decided_label.is_some_and(SdgLabel::is_decision) {
        let group_sizes = sorted_sizes(counts);
        return Ok(Classification {
            scenario: ScenarioType::Decided,
            total_votes: group_sizes.iter().sum(),
            group_sizes,
            deviation: None,
        });
    }
    classify_detailed(counts, votes_needed, cfg)
}

pub fn classify_detailed(
    counts: &LabelCounts,
    votes_needed: usize,
    cfg: &ScenarioConfig,
) -> Result<Classification> {
    let group_sizes = sorted_sizes(counts);
    let total: usize = group_sizes.iter().sum();

    if total == 0 && votes_needed > 0 {
        return Err(EngineError::insufficient("no votes to classify"));
    }

    let done = |scenario, deviation| Classification {
        scenario,
        total_votes: total,
        group_sizes: group_sizes.clone(),
        deviation,
    };

    if total < votes_needed {
        return Ok(done(ScenarioType::NotEnoughVotes, None));
    }

    if group_sizes.len() == 1 && cfg.unanimous_confirms {
        return Ok(done(ScenarioType::Confirm, Some(0.0)));
    }

    let shares: Vec<f64> = group_sizes
        .iter()
        .map(|c| *c as f64 / total as f64)
        .collect();

    let best = cfg
        .patterns
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| match_pattern(&shares, p, cfg).map(|dev| (idx, p, dev)))
        .min_by(|a, b| rank(a, b, cfg.tie_break));

    Ok(match best {
        Some((_, p, dev)) => done(p.scenario, Some(dev)),
        None => done(ScenarioType::NoSpecificScenario, None),
    })
}

type Candidate<'a> = (usize, &'a DistributionPattern, f64);

fn rank(a: &Candidate<'_>, b: &Candidate<'_>, tie: TieBreak) -> std::cmp::Ordering {
    let by_groups = a.1.sizes.len().cmp(&b.1.sizes.len());
    let by_fit = a.2.total_cmp(&b.2);
    let by_order = a.0.cmp(&b.0);
    match tie {
        TieBreak::FewestGroups => by_groups.then(by_fit).then(by_order),
        TieBreak::ClosestFit => by_fit.then(by_order),
        TieBreak::DeclarationOrder => by_order,
    }
}

/// Max share deviation if `shares` fits `pattern`, else `None`.
fn match_pattern(
    shares: &[f64],
    pattern: &DistributionPattern,
    cfg: &ScenarioConfig,
) -> Option<f64> {
    let want = pattern.shares();
    if shares.len() < want.len() {
        return None;
    }
    let residual: f64 = shares[want.len()..].iter().sum();
    if residual > cfg.residual_tolerance + 1e-9 {
        return None;
    }
    let dev = shares
        .iter()
        .zip(want.iter())
        .map(|(have, want)| (have - want).abs())
        .fold(residual, f64::max);
    (dev <= cfg.tolerance + 1e-9).then_some(dev)
}

fn sorted_sizes(counts: &LabelCounts) -> Vec<usize> {
    let mut sizes: Vec<usize> = counts.values().copied().filter(|c| *c > 0).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes
}
