use std::io::Read;

use anyhow::Context;
use confluence::{MarketData, ScorerConfig, SignalScorer};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One scoring request read from the input file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRequest {
    symbol: String,
    #[serde(default)]
    market_data: MarketData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreReport<'a> {
    signals: &'a [confluence::Signal],
    stats: confluence::StatsSnapshot,
    summary: confluence::PerformanceSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confluence=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ScorerConfig::from_env().context("invalid scorer configuration")?;
    info!("Scoring with {:?} rubric, risk level {:?}", config.rubric, config.sizing.risk_level);

    let input = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            buf
        }
    };

    let requests: Vec<ScoreRequest> =
        serde_json::from_str(&input).context("input must be a JSON array of {symbol, marketData}")?;
    info!("Scoring {} request(s)", requests.len());

    let scorer = SignalScorer::try_new(config)?.with_batching();
    let signals = join_all(
        requests
            .iter()
            .map(|r| scorer.score_signal(&r.symbol, r.market_data.clone())),
    )
    .await;

    let report = ScoreReport {
        signals: &signals,
        stats: scorer.stats(),
        summary: scorer.performance_summary(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
