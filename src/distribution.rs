//! # Distribution metrics
//! Entropy and sample standard deviation over model prediction vectors.
//!
//! Pure functions; used by the ranking module to pick publications for
//! active-learning exploration.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::sdg::SDG_COUNT;

/// Shannon entropy (bits) of `values` after normalizing to a distribution.
///
/// Zero and negative entries are dropped before normalization. A vector
/// whose sum is zero has entropy `0.0` by convention.
pub fn entropy(values: &[f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    if sum == 0.0 {
        return 0.0;
    }

    let positive = values.iter().copied().filter(|v| *v > 0.0 && v.is_finite());
    let total: f64 = positive.clone().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let h = positive
        .map(|v| {
            let p = v / total;
            -p * p.log2()
        })
        .sum::<f64>();
    // -0.0 for single-entry distributions
    h.max(0.0)
}

/// Sample standard deviation (Bessel-corrected, divisor `n - 1`).
pub fn stddev(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(EngineError::insufficient(format!(
            "standard deviation needs at least 2 values, got {}",
            values.len()
        )));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(EngineError::invalid(format!(
            "non-finite value {bad} in vector"
        )));
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok(var.sqrt())
}

/// Per-goal prediction of one model for one publication (SDG 1..=17).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct PredictionVector(Vec<f64>);

impl PredictionVector {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.len() != SDG_COUNT {
            return Err(EngineError::invalid(format!(
                "prediction vector must have {SDG_COUNT} entries, got {}",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(EngineError::invalid(format!(
                "prediction value {bad} is not a non-negative number"
            )));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub fn entropy(&self) -> f64 {
        entropy(&self.0)
    }

    pub fn stddev(&self) -> Result<f64> {
        stddev(&self.0)
    }
}

impl TryFrom<Vec<f64>> for PredictionVector {
    type Error = EngineError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<PredictionVector> for Vec<f64> {
    fn from(v: PredictionVector) -> Vec<f64> {
        v.0
    }
}
