//! Top-N publication selection by prediction-distribution metric.
//!
//! High entropy / low standard deviation means the model is unsure which goal
//! fits, which is what active-learning exploration wants to surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::distribution::{entropy, stddev};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Entropy,
    StandardDeviation,
}

impl FromStr for RankMetric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entropy" => Ok(Self::Entropy),
            "standard_deviation" | "std" => Ok(Self::StandardDeviation),
            other => Err(EngineError::invalid(format!(
                "unknown metric `{other}` (expected entropy | standard_deviation)"
            ))),
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Entropy => "entropy",
            Self::StandardDeviation => "standard_deviation",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    /// Highest values first.
    Top,
    /// Lowest values first.
    Bottom,
}

impl FromStr for RankOrder {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(EngineError::invalid(format!(
                "unknown order `{other}` (expected top | bottom)"
            ))),
        }
    }
}

/// Stored prediction values for one publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub publication_id: String,
    pub values: Vec<f64>,
}

impl PredictionRecord {
    pub fn new(publication_id: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            publication_id: publication_id.into(),
            values,
        }
    }

    pub fn metric(&self, metric: RankMetric) -> Result<f64> {
        match metric {
            RankMetric::Entropy => Ok(entropy(&self.values)),
            RankMetric::StandardDeviation => stddev(&self.values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPublication {
    pub publication_id: String,
    pub value: f64,
}

/// String-keyed entry point: validates `metric` and `order` names.
pub fn top_n(
    metric: &str,
    order: &str,
    n: usize,
    records: &[PredictionRecord],
) -> Result<Vec<RankedPublication>> {
    top_n_by(metric.parse()?, order.parse()?, n, records)
}

pub fn top_n_by(
    metric: RankMetric,
    order: RankOrder,
    n: usize,
    records: &[PredictionRecord],
) -> Result<Vec<RankedPublication>> {
    if n == 0 {
        return Err(EngineError::invalid("n must be positive"));
    }
    let scored = records
        .iter()
        .map(|r| {
            Ok(RankedPublication {
                publication_id: r.publication_id.clone(),
                value: r.metric(metric)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    select(order, n, scored)
}

/// Sort precomputed values and keep `n`. Ties keep input order.
pub fn select(
    order: RankOrder,
    n: usize,
    mut scored: Vec<RankedPublication>,
) -> Result<Vec<RankedPublication>> {
    if n == 0 {
        return Err(EngineError::invalid("n must be positive"));
    }
    // sort_by is stable
    match order {
        RankOrder::Top => scored.sort_by(|a, b| b.value.total_cmp(&a.value)),
        RankOrder::Bottom => scored.sort_by(|a, b| a.value.total_cmp(&b.value)),
    }
    scored.truncate(n);
    Ok(scored)
}
