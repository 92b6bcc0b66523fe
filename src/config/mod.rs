// src/config/mod.rs
//! Engine configuration: scoring constants, scenario patterns, reward blend
//! and evaluator wiring. Loaded from TOML; every section and field is optional
//! and falls back to the built-in defaults.
//!
//! ```toml
//! [scoring]
//! x = 20.0
//! luck_offset = 10.0
//!
//! [scenarios]
//! votes_needed = 10
//! tolerance = 0.05
//!
//! [[scenarios.patterns]]
//! scenario = "CONFIRM"
//! sizes = [6, 4]
//!
//! [reward]
//! xp_scale = 10.0
//! ```

pub mod reload;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::evaluator::EvaluationScore;
use crate::scenario::ScenarioConfig;
use crate::scoring::ScoringParams;

pub use reload::HotReloadConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_CONFIG_PATH: &str = "LABEL_ENGINE_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringParams,
    pub scenarios: ScenarioConfig,
    pub reward: RewardConfig,
    pub evaluator: EvaluatorConfig,
}

/// How evaluation quality turns into XP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// XP = round(quality_signal * xp_scale).
    pub xp_scale: f64,
    pub llm_weight: f64,
    pub semantic_weight: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            xp_scale: 10.0,
            llm_weight: 0.5,
            semantic_weight: 0.5,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.xp_scale.is_finite() || self.xp_scale < 0.0 {
            return Err(EngineError::invalid("reward.xp_scale must be >= 0"));
        }
        let weights = [self.llm_weight, self.semantic_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
            || self.llm_weight + self.semantic_weight <= 0.0
        {
            return Err(EngineError::invalid(
                "reward weights must be >= 0 with a positive sum",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorMode {
    /// Every evaluation fails; annotation rewards are reported as failures.
    #[default]
    Disabled,
    /// Deterministic stand-in returning `fixed_score`.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub mode: EvaluatorMode,
    pub fixed_score: Option<EvaluationScore>,
    /// Max cached evaluations; 0 disables the cache.
    pub cache_capacity: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            mode: EvaluatorMode::Disabled,
            fixed_score: None,
            cache_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.scenarios.validate()?;
        self.reward.validate()?;
        if self.evaluator.mode == EvaluatorMode::Fixed {
            match &self.evaluator.fixed_score {
                Some(s) => s.validate().map_err(|e| EngineError::invalid(e.to_string()))?,
                None => {
                    return Err(EngineError::invalid(
                        "evaluator.mode = \"fixed\" needs evaluator.fixed_score",
                    ))
                }
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: EngineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }

    /// Resolve the config path and load it:
    /// 1) `$LABEL_ENGINE_CONFIG_PATH` (must exist)
    /// 2) `config/engine.toml`
    /// 3) built-in defaults
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        info!("no engine config found, using built-in defaults");
        Ok(Self::default())
    }
}
