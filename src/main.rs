//! Demo entrypoint: runs the engine over a JSON fixture and prints a JSON report.
//!
//! Usage: `sdg-label-engine <fixture.json> [metric] [order] [n]`
//! (defaults: `entropy top 5`). See `demos/fixture.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sdg_label_engine::evaluator::build_evaluator;
use sdg_label_engine::ranking::PredictionRecord;
use sdg_label_engine::scoring::vote_count;
use sdg_label_engine::telemetry::{self, Metrics};
use sdg_label_engine::{
    assess, top_n, AnnotationRequest, EngineConfig, InMemoryLedger, LedgerStore,
    PredictionVector, PublicationAssessment, RankedPublication, RewardAggregator,
    RewardOutcome, SdgLabel, VoteRecord,
};

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    publications: Vec<FixturePublication>,
    #[serde(default)]
    annotations: Vec<FixtureAnnotation>,
}

#[derive(Debug, Deserialize)]
struct FixturePublication {
    id: String,
    #[serde(default)]
    votes: Vec<FixtureVote>,
    #[serde(default)]
    decided_label: Option<SdgLabel>,
    #[serde(default)]
    predictions: Option<PredictionVector>,
}

#[derive(Debug, Deserialize)]
struct FixtureVote {
    user: String,
    label: SdgLabel,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct FixtureAnnotation {
    user: String,
    #[serde(flatten)]
    request: AnnotationRequest,
}

#[derive(Debug, Serialize)]
struct PublicationReport {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assessment: Option<PublicationAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    not_ready: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    publications: Vec<PublicationReport>,
    rewards: Vec<RewardOutcome>,
    failures: Vec<String>,
    ranking: Vec<RankedPublication>,
    balances: BTreeMap<String, i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    let metrics = Metrics::from_env()?;

    let mut args = std::env::args().skip(1);
    let Some(fixture_path) = args.next().map(PathBuf::from) else {
        bail!("usage: sdg-label-engine <fixture.json> [metric] [order] [n]");
    };
    let metric = args.next().unwrap_or_else(|| "entropy".to_string());
    let order = args.next().unwrap_or_else(|| "top".to_string());
    let n: usize = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid n `{s}`"))?,
        None => 5,
    };

    let cfg = EngineConfig::load_default()?;
    let raw = std::fs::read_to_string(&fixture_path)
        .with_context(|| format!("reading fixture {}", fixture_path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .with_context(|| format!("parsing fixture {}", fixture_path.display()))?;

    let evaluator = build_evaluator(&cfg.evaluator);
    let ledger = Arc::new(InMemoryLedger::new());
    let aggregator = RewardAggregator::new(evaluator, ledger.clone(), &cfg)?;
    info!(
        publications = fixture.publications.len(),
        annotations = fixture.annotations.len(),
        "running engine over fixture"
    );

    let mut report = Report {
        publications: Vec::new(),
        rewards: Vec::new(),
        failures: Vec::new(),
        ranking: Vec::new(),
        balances: BTreeMap::new(),
    };

    let mut records = Vec::new();
    for publication in &fixture.publications {
        if let Some(p) = &publication.predictions {
            records.push(PredictionRecord::new(&publication.id, p.values().to_vec()));
        }

        let votes: Vec<VoteRecord> = publication
            .votes
            .iter()
            .map(|v| VoteRecord::new(v.label, v.confidence))
            .collect();
        let assessment = match assess(&votes, publication.decided_label, &cfg) {
            Ok(a) => a,
            Err(e) if e.is_not_ready() => {
                report.publications.push(PublicationReport {
                    id: publication.id.clone(),
                    assessment: None,
                    not_ready: Some(e.to_string()),
                });
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("assessing {}", publication.id)),
        };

        // Pay each voter the quality weight of the label they voted for.
        for vote in &publication.votes {
            let Some(w) = assessment.weight_for(vote.label) else {
                continue;
            };
            let reason = format!("label {} on {}", w.label, publication.id);
            let paid = vote_count(w.votes).and_then(|votes| {
                aggregator.reward_label(&vote.user, votes, w.max_confidence, &reason)
            });
            match paid {
                Ok(out) => report.rewards.push(out),
                Err(e) => report.failures.push(format!("{}: {e}", vote.user)),
            }
        }

        report.publications.push(PublicationReport {
            id: publication.id.clone(),
            assessment: Some(assessment),
            not_ready: None,
        });
    }

    for a in &fixture.annotations {
        match aggregator.reward_annotation(&a.user, &a.request).await {
            Ok(out) => report.rewards.push(out),
            Err(e) => {
                warn!(user = %a.user, error = %e, "annotation reward failed");
                report.failures.push(format!("{}: {e}", a.user));
            }
        }
    }

    if !records.is_empty() {
        report.ranking = top_n(&metric, &order, n, &records)?;
    }

    for account in ledger.accounts() {
        report
            .balances
            .insert(account.to_string(), ledger.running_total(&account));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}
