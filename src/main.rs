use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{info, warn};

use phrase_clip_indexer::config::{api_key_from_env, Config};
use phrase_clip_indexer::matching::MatchPolicy;
use phrase_clip_indexer::pipeline::Indexer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phrase_clip_indexer=info,warn".into()),
        )
        .init();

    let matches = Command::new("Phrase Clip Indexer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a phrase → YouTube clip candidate index from trusted channels and search")
        .arg(
            Arg::new("phrases")
                .short('p')
                .long("phrases")
                .value_name("FILE")
                .help("Phrase catalog JSON file"),
        )
        .arg(
            Arg::new("channels")
                .short('c')
                .long("channels")
                .value_name("FILE")
                .help("Channel catalog JSON file (skips channel pass if omitted)"),
        )
        .arg(
            Arg::new("index")
                .short('i')
                .long("index")
                .value_name("FILE")
                .help("Index artifact to load and update"),
        )
        .arg(
            Arg::new("language")
                .short('l')
                .long("language")
                .value_name("LANG")
                .help("Transcript and search language code"),
        )
        .arg(
            Arg::new("max-candidates")
                .long("max-candidates")
                .value_name("NUM")
                .help("Clip candidates retained per phrase"),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_name("POLICY")
                .help("Segment selection policy: first-match or best-of-video"),
        )
        .arg(
            Arg::new("delay-ms")
                .long("delay-ms")
                .value_name("MS")
                .help("Delay between external calls in the fallback pass"),
        )
        .get_matches();

    let mut config = Config::load();

    if let Some(path) = matches.get_one::<String>("phrases") {
        config.catalog.phrases_path = PathBuf::from(path);
    }
    if let Some(path) = matches.get_one::<String>("channels") {
        config.catalog.channels_path = Some(PathBuf::from(path));
    }
    if let Some(path) = matches.get_one::<String>("index") {
        config.catalog.index_path = PathBuf::from(path);
    }
    if let Some(language) = matches.get_one::<String>("language") {
        config.api.language = language.clone();
    }
    if let Some(cap) = matches.get_one::<String>("max-candidates") {
        config.matching.max_candidates = cap.parse()?;
    }
    if let Some(policy) = matches.get_one::<String>("policy") {
        config.matching.policy = policy
            .parse::<MatchPolicy>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(delay) = matches.get_one::<String>("delay-ms") {
        config.pacing.search_delay_ms = delay.parse()?;
    }

    config.validate()?;

    // Missing credential is the one fatal startup condition.
    let api_key = api_key_from_env()?;

    info!("Phrase clip indexer starting...");
    info!("Phrase catalog: {}", config.catalog.phrases_path.display());
    match &config.catalog.channels_path {
        Some(path) => info!("Channel catalog: {}", path.display()),
        None => warn!("No channel catalog configured, relying on search fallback only"),
    }
    info!("Index artifact: {}", config.catalog.index_path.display());

    let indexer = Indexer::with_live_api(config, api_key);

    let start_time = std::time::Instant::now();
    let report = indexer.run().await?;
    let duration = start_time.elapsed();

    info!("Run completed in {:.1}s", duration.as_secs_f64());
    info!(
        "Phrases: {} total, {} at quota",
        report.phrases_total, report.phrases_at_cap
    );
    info!("Candidates added this run: {}", report.candidates_added);
    info!(
        "Channels scanned: {}, searches issued: {}",
        report.channels_scanned, report.searches_issued
    );
    info!(
        "Transcripts: {} fetched, {} unavailable",
        report.transcripts_fetched, report.transcripts_missing
    );

    Ok(())
}
