//! # SDG labels and votes
//!
//! Labels are SDG indices in `[-1, 18]`:
//! - `-1` means "not defined" (no usable label),
//! - `1..=17` are the Sustainable Development Goals,
//! - `18` is the "zero class" (publication is SDG-irrelevant).
//!
//! Votes arrive already deduplicated per user from the voting subsystem;
//! this module only validates and tallies them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Number of goals in a prediction vector (SDG 1..=17).
pub const SDG_COUNT: usize = 17;

/// A validated SDG label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct SdgLabel(i8);

impl SdgLabel {
    pub const NOT_DEFINED: SdgLabel = SdgLabel(-1);
    pub const UNDEFINED: SdgLabel = SdgLabel(0);
    pub const ZERO_CLASS: SdgLabel = SdgLabel(18);

    pub const MIN: i8 = -1;
    pub const MAX: i8 = 18;

    pub fn new(value: i8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(EngineError::invalid(format!(
                "label {value} outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// Shorthand for goals 1..=17.
    pub fn goal(n: u8) -> Result<Self> {
        if (1..=SDG_COUNT as u8).contains(&n) {
            Ok(Self(n as i8))
        } else {
            Err(EngineError::invalid(format!("SDG goal {n} outside [1, 17]")))
        }
    }

    pub fn value(self) -> i8 {
        self.0
    }

    /// True for SDG 1..=17.
    pub fn is_goal(self) -> bool {
        (1..=SDG_COUNT as i8).contains(&self.0)
    }

    pub fn is_defined(self) -> bool {
        self != Self::NOT_DEFINED
    }

    /// A stored decision: neither `NOT_DEFINED` (-1) nor `UNDEFINED` (0).
    pub fn is_decision(self) -> bool {
        self != Self::NOT_DEFINED && self != Self::UNDEFINED
    }
}

impl TryFrom<i8> for SdgLabel {
    type Error = EngineError;

    fn try_from(value: i8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SdgLabel> for i8 {
    fn from(label: SdgLabel) -> i8 {
        label.0
    }
}

impl fmt::Display for SdgLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NOT_DEFINED => f.write_str("not_defined"),
            Self::ZERO_CLASS => f.write_str("zero_class"),
            Self::UNDEFINED => f.write_str("undefined"),
            SdgLabel(n) => write!(f, "SDG{n}"),
        }
    }
}

/// One user's vote on a publication.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub label: SdgLabel,
    /// Voter confidence (weight) in `[0.0, 1.0]`.
    pub confidence: f64,
}

impl VoteRecord {
    pub fn new(label: SdgLabel, confidence: f64) -> Self {
        Self { label, confidence }
    }

    fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngineError::invalid(format!(
                "vote confidence {} outside [0, 1] for {}",
                self.confidence, self.label
            )));
        }
        Ok(())
    }
}

/// Vote counts per label. Ordered map keeps iteration deterministic.
pub type LabelCounts = BTreeMap<SdgLabel, usize>;

/// Count votes per label.
pub fn tally(votes: &[VoteRecord]) -> Result<LabelCounts> {
    let mut counts = LabelCounts::new();
    for v in votes {
        v.validate()?;
        *counts.entry(v.label).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Highest voter confidence per label (the `P_max` fed to the scorer).
pub fn max_confidence_by_label(votes: &[VoteRecord]) -> Result<BTreeMap<SdgLabel, f64>> {
    let mut out: BTreeMap<SdgLabel, f64> = BTreeMap::new();
    for v in votes {
        v.validate()?;
        let slot = out.entry(v.label).or_insert(0.0);
        if v.confidence > *slot {
            *slot = v.confidence;
        }
    }
    Ok(out)
}

/// Build counts from `(label, count)` pairs, e.g. for fixtures.
pub fn counts_from_pairs(pairs: &[(i8, usize)]) -> Result<LabelCounts> {
    let mut counts = LabelCounts::new();
    for &(label, n) in pairs {
        *counts.entry(SdgLabel::new(label)?).or_insert(0) += n;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l(v: i8) -> SdgLabel {
        SdgLabel::new(v).unwrap()
    }

    #[test]
    fn label_range_is_enforced() {
        assert!(SdgLabel::new(-1).is_ok());
        assert!(SdgLabel::new(18).is_ok());
        assert!(matches!(
            SdgLabel::new(19),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            SdgLabel::new(-2),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(SdgLabel::goal(0).is_err());
        assert!(SdgLabel::goal(17).unwrap().is_goal());
        assert!(!SdgLabel::ZERO_CLASS.is_goal());
        assert!(!SdgLabel::NOT_DEFINED.is_defined());
        assert!(!SdgLabel::NOT_DEFINED.is_decision());
        assert!(!SdgLabel::UNDEFINED.is_decision());
        assert!(SdgLabel::ZERO_CLASS.is_decision());
    }

    #[test]
    fn label_deserialize_rejects_out_of_range() {
        let ok: SdgLabel = serde_json::from_str("7").unwrap();
        assert_eq!(ok, l(7));
        assert!(serde_json::from_str::<SdgLabel>("42").is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(l(3).to_string(), "SDG3");
        assert_eq!(SdgLabel::ZERO_CLASS.to_string(), "zero_class");
        assert_eq!(SdgLabel::NOT_DEFINED.to_string(), "not_defined");
    }

    #[test]
    fn tally_counts_and_max_confidence() {
        let votes = vec![
            VoteRecord::new(l(3), 0.4),
            VoteRecord::new(l(3), 0.9),
            VoteRecord::new(l(7), 0.5),
        ];
        let counts = tally(&votes).unwrap();
        assert_eq!(counts[&l(3)], 2);
        assert_eq!(counts[&l(7)], 1);

        let pmax = max_confidence_by_label(&votes).unwrap();
        assert!((pmax[&l(3)] - 0.9).abs() < 1e-12);
        assert!((pmax[&l(7)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tally_rejects_bad_confidence() {
        let votes = vec![VoteRecord::new(l(3), 1.5)];
        assert!(matches!(tally(&votes), Err(EngineError::InvalidArgument(_))));
        let votes = vec![VoteRecord::new(l(3), f64::NAN)];
        assert!(tally(&votes).is_err());
    }
}
