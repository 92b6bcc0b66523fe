//! # Label-quality scoring
//!
//! Maps `(vote_count N, max_confidence P_max)` to a bounded integer score used
//! to weight labels and pay out coins.
//!
//! Components (all scaled by `X`):
//! - bootstrap `S_B = X * P^alpha * e^(-lambda*N)`: early strong signal, decays with N
//! - interest `S_I = X * (1 - e^(-mu*N)) * P^beta`: grows and saturates with N
//! - u-shape: negative Gaussian at the doubt valley (N≈5), positive at recovery (N≈10)
//! - luck: SHA-256 derived scale in `[0.9, 1.1]` times a Gaussian bump, plus an offset
//!
//! The canonical output is `max(round(sum), 0)`. `ScoreBreakdown::raw` is the
//! unclamped sum and is for diagnostics only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

/// Tunable constants of the scoring curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Global scale `X`.
    pub x: f64,
    pub alpha: f64,
    pub beta: f64,
    pub lambda: f64,
    pub mu: f64,

    /// Valley depth as a fraction of `X` (0.4 → bump amplitude `0.4X - X`).
    pub valley_floor: f64,
    pub valley_center: f64,
    pub valley_width: f64,
    /// Recovery height as a fraction of `X` (1.2 → amplitude `1.2X - 0.4X`).
    pub peak_height: f64,
    pub peak_center: f64,
    pub peak_width: f64,

    /// `L_max`
    pub luck_max: f64,
    /// `N_luck`
    pub luck_center: f64,
    /// `sigma`
    pub luck_spread: f64,
    pub luck_offset: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            x: 20.0,
            alpha: 2.0,
            beta: 1.0,
            lambda: 0.05,
            mu: 0.25,
            valley_floor: 0.4,
            valley_center: 5.0,
            valley_width: 1.5,
            peak_height: 1.2,
            peak_center: 10.0,
            peak_width: 3.0,
            luck_max: 3.0,
            luck_center: 8.0,
            luck_spread: 4.0,
            luck_offset: 10.0,
        }
    }
}

/// Individual curve components for one `(N, P_max)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub bootstrap: f64,
    pub interest: f64,
    pub u_shape: f64,
    pub luck: f64,
    /// Unclamped, unrounded sum.
    pub raw: f64,
}

impl ScoreBreakdown {
    /// Canonical clamped and rounded score.
    pub fn score(&self) -> u32 {
        let r = self.raw.round();
        if r <= 0.0 {
            0
        } else {
            r.min(u32::MAX as f64) as u32
        }
    }
}

impl ScoringParams {
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("x", self.x),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("lambda", self.lambda),
            ("mu", self.mu),
            ("valley_floor", self.valley_floor),
            ("valley_center", self.valley_center),
            ("valley_width", self.valley_width),
            ("peak_height", self.peak_height),
            ("peak_center", self.peak_center),
            ("peak_width", self.peak_width),
            ("luck_max", self.luck_max),
            ("luck_center", self.luck_center),
            ("luck_spread", self.luck_spread),
            ("luck_offset", self.luck_offset),
        ];
        if let Some((name, v)) = all.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::invalid(format!("scoring.{name} = {v} is not finite")));
        }
        for (name, v) in [
            ("valley_width", self.valley_width),
            ("peak_width", self.peak_width),
            ("luck_spread", self.luck_spread),
        ] {
            if v <= 0.0 {
                return Err(EngineError::invalid(format!("scoring.{name} must be > 0")));
            }
        }
        if self.luck_offset < 0.0 || self.luck_max < 0.0 {
            return Err(EngineError::invalid(
                "scoring.luck_offset and scoring.luck_max must be >= 0",
            ));
        }
        Ok(())
    }

    /// Compute all components for `(vote_count, max_confidence)`.
    pub fn breakdown(&self, vote_count: u32, max_confidence: f64) -> Result<ScoreBreakdown> {
        check_confidence(max_confidence)?;
        let n = vote_count as f64;
        let p = max_confidence;
        let x = self.x;

        let bootstrap = x * p.powf(self.alpha) * (-self.lambda * n).exp();
        let interest = x * (1.0 - (-self.mu * n).exp()) * p.powf(self.beta);
        let u_shape = (self.valley_floor * x - x) * gauss(n, self.valley_center, self.valley_width)
            + (self.peak_height * x - self.valley_floor * x)
                * gauss(n, self.peak_center, self.peak_width);
        let luck = self.deterministic_luck(vote_count, max_confidence);

        Ok(ScoreBreakdown {
            bootstrap,
            interest,
            u_shape,
            luck,
            raw: bootstrap + interest + u_shape + luck,
        })
    }

    /// Canonical label-quality score.
    pub fn score(&self, vote_count: u32, max_confidence: f64) -> Result<u32> {
        Ok(self.breakdown(vote_count, max_confidence)?.score())
    }

    /// Reproducible luck bonus for `(N, P_max)`. Never below `luck_offset`.
    pub fn deterministic_luck(&self, vote_count: u32, max_confidence: f64) -> f64 {
        let scale = luck_scale(vote_count, max_confidence);
        let bump = self.luck_max * gauss(vote_count as f64, self.luck_center, self.luck_spread);
        scale * bump + self.luck_offset
    }

    /// Scores for `N = 0..=max_votes` at a fixed confidence.
    pub fn score_curve(&self, max_confidence: f64, max_votes: u32) -> Result<Vec<(u32, u32)>> {
        (0..=max_votes)
            .map(|n| Ok((n, self.score(n, max_confidence)?)))
            .collect()
    }
}

/// Vote count as the scorer's `N`; counts beyond `u32` are rejected.
pub fn vote_count(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| EngineError::invalid(format!("vote count {n} exceeds u32")))
}

/// Label-quality score with the default constants.
pub fn score(vote_count: u32, max_confidence: f64) -> Result<u32> {
    ScoringParams::default().score(vote_count, max_confidence)
}

/// Hash-derived factor in `[0.9, 1.1)`.
///
/// SHA-256 of the UTF-8 key `"{N}-{P_max}"`, read as a big-endian integer,
/// reduced mod 1000 and mapped linearly. The float is rendered the way the
/// historical scores were keyed (`1.0`, `0.5`, `1e-05`).
pub fn luck_scale(vote_count: u32, max_confidence: f64) -> f64 {
    let key = format!("{}-{}", vote_count, float_key(max_confidence));
    let digest = Sha256::digest(key.as_bytes());
    let bucket = digest
        .iter()
        .fold(0u32, |acc, b| (acc * 256 + u32::from(*b)) % 1000);
    0.9 + 0.2 * (f64::from(bucket) / 1000.0)
}

fn gauss(n: f64, center: f64, width: f64) -> f64 {
    (-((n - center) / width).powi(2)).exp()
}

fn check_confidence(p: f64) -> Result<()> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(EngineError::invalid(format!(
            "max_confidence {p} outside [0, 1]"
        )));
    }
    Ok(())
}

/// Shortest round-trip float text with a trailing `.0` for integral values and
/// two-digit exponents for small magnitudes.
fn float_key(v: f64) -> String {
    if v == 0.0 {
        return "0.0".to_string();
    }
    let a = v.abs();
    if a < 1e-4 || a >= 1e16 {
        let s = format!("{v:e}");
        return match s.split_once('e') {
            Some((mant, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{mant}e{sign}{digits:0>2}")
            }
            None => s,
        };
    }
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_vote_count_is_rejected() {
        assert_eq!(vote_count(12).unwrap(), 12);
        assert!(matches!(
            vote_count(u32::MAX as usize + 1),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn float_key_matches_historical_rendering() {
        assert_eq!(float_key(1.0), "1.0");
        assert_eq!(float_key(0.0), "0.0");
        assert_eq!(float_key(0.5), "0.5");
        assert_eq!(float_key(0.75), "0.75");
        assert_eq!(float_key(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(float_key(0.00001), "1e-05");
        assert_eq!(float_key(0.000015), "1.5e-05");
    }

    #[test]
    fn luck_scale_is_pinned() {
        // sha256("8-0.5") mod 1000 = 520
        assert!((luck_scale(8, 0.5) - 1.004).abs() < 1e-12);
        // sha256("1-1.0") mod 1000 = 41
        assert!((luck_scale(1, 1.0) - 0.9082).abs() < 1e-12);
    }

    #[test]
    fn luck_at_center_is_pinned() {
        let p = ScoringParams::default();
        let l = p.deterministic_luck(8, 0.5);
        assert!((l - 13.012).abs() < 1e-9, "luck={l}");
    }

    #[test]
    fn luck_stays_within_offset_band() {
        let p = ScoringParams::default();
        for n in 0..=50 {
            for k in 0..=20 {
                let l = p.deterministic_luck(n, k as f64 / 20.0);
                assert!(l >= p.luck_offset);
                assert!(l <= p.luck_offset + 1.1 * p.luck_max + 1e-12);
            }
        }
    }

    #[test]
    fn pinned_scores() {
        for (n, conf, want) in [
            (0, 0.0, 10),
            (1, 1.0, 34),
            (3, 1.0, 36),
            (5, 0.0, 1),
            (5, 0.6, 15),
            (8, 0.5, 35),
            (10, 0.9, 54),
            (13, 0.75, 37),
        ] {
            assert_eq!(score(n, conf).unwrap(), want, "N={n} P={conf}");
        }
    }

    #[test]
    fn valley_then_recovery() {
        let p = ScoringParams::default();
        let at = |n| p.score(n, 0.8).unwrap();
        assert!(at(5) < at(2), "dip at the valley");
        assert!(at(10) > at(5), "recovers by 10 votes");
    }

    #[test]
    fn breakdown_raw_is_component_sum() {
        let b = ScoringParams::default().breakdown(6, 0.7).unwrap();
        let sum = b.bootstrap + b.interest + b.u_shape + b.luck;
        assert!((b.raw - sum).abs() < 1e-12);
        assert_eq!(b.score(), b.raw.round().max(0.0) as u32);
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        assert!(matches!(
            score(3, 1.2),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(score(3, f64::NAN).is_err());
        assert!(score(3, -0.1).is_err());
    }

    #[test]
    fn negative_raw_clamps_to_zero() {
        let p = ScoringParams {
            luck_offset: 0.0,
            luck_max: 0.0,
            ..ScoringParams::default()
        };
        let b = p.breakdown(5, 0.0).unwrap();
        assert!(b.raw < 0.0);
        assert_eq!(b.score(), 0);
    }

    #[test]
    fn curve_covers_each_vote_count() {
        let curve = ScoringParams::default().score_curve(0.9, 13).unwrap();
        assert_eq!(curve.len(), 14);
        assert_eq!(curve[10], (10, 54));
    }

    #[test]
    fn validate_rejects_zero_spread() {
        let p = ScoringParams {
            luck_spread: 0.0,
            ..ScoringParams::default()
        };
        assert!(p.validate().is_err());
        assert!(ScoringParams::default().validate().is_ok());
    }
}
