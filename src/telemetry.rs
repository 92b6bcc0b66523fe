//! Logging and metrics bootstrap for the binary.
//!
//! The library only emits through the `tracing` and `metrics` facades; installing
//! a subscriber or recorder is left to whoever embeds it.

use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "LABEL_ENGINE_LOG_JSON";
pub const ENV_METRICS: &str = "LABEL_ENGINE_METRICS";

/// One-time metric descriptions (so series carry help text once exported).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "label_quality_scores_total",
            "Label-quality scores computed for wallet rewards."
        );
        describe_counter!("reward_xp_awarded_total", "XP granted for annotations.");
        describe_counter!(
            "reward_evaluations_failed_total",
            "Annotation rewards aborted by evaluator failures."
        );
        describe_counter!(
            "reward_evaluations_skipped_total",
            "Blank annotations rewarded with 0 XP without evaluation."
        );
        describe_counter!("ledger_entries_total", "Ledger entries appended.");
        describe_counter!("evaluator_cache_hits_total", "Evaluator cache hits.");
        describe_counter!("evaluator_cache_misses_total", "Evaluator cache misses.");
    });
}

/// Install the tracing subscriber. `LABEL_ENGINE_LOG_JSON=1` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sdg_label_engine=info,warn"));

    let json = std::env::var(ENV_LOG_JSON).ok().as_deref() == Some("1");
    let registry = tracing_subscriber::registry().with(filter);
    // try_init: a second call (tests, embedding apps) is not an error
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder when `LABEL_ENGINE_METRICS=1`.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let on = std::env::var(ENV_METRICS).ok().as_deref() == Some("1");
        if !on {
            return Ok(None);
        }
        Self::init().map(Some)
    }

    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe_metrics();
        gauge!("label_engine_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
