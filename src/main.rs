//! Replay Sentry - transaction replay analyzer
//!
//! Replays a transaction through the node's trace API and prints the
//! security summary plus the full analysis record as JSON.
//!
//! Usage: replay_sentry <tx-hash> [trace,stateDiff,vmTrace]

use replay_sentry::{cancel_pair, AnalysisConfig, ReplayAnalyzer, TracerType};
use replay_sentry::utils::validation::parse_tracer_names;

use eyre::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let tx_hash = match args.next() {
        Some(hash) => hash,
        None => {
            eprintln!("Usage: replay_sentry <tx-hash> [trace,stateDiff,vmTrace]");
            std::process::exit(2);
        }
    };
    let tracers = match args.next() {
        Some(spec) => parse_tracer_names(&spec.split(',').collect::<Vec<_>>())
            .map_err(|e| eyre::eyre!(e.to_string()))?,
        None => TracerType::ALL.to_vec(),
    };

    if std::env::var("REPLAY_RPC_URL").is_err() {
        eprintln!("⚠️  REPLAY_RPC_URL not set; using public default endpoint.");
        eprintln!("   Trace methods need an archive node (Alchemy, Erigon, Reth).");
    }

    let config = AnalysisConfig::default();
    let analyzer = ReplayAnalyzer::new(config).map_err(|e| eyre::eyre!(e.to_string()))?;

    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n🛑 Cancelling...");
            handle.cancel();
        }
    });

    let result = analyzer
        .analyze_transaction(&tx_hash, tracers, &token)
        .await
        .map_err(|e| eyre::eyre!(e.to_string()))?;

    println!("{}", result.summary());
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
