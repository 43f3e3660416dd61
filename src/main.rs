use std::io::{self, BufRead};

use anyhow::Context;
use serde::Deserialize;
use tracing::{error, info};

use newsdedup::config::Config;
use newsdedup::observability::Telemetry;
use newsdedup::pipeline::driver::{self, DriverError, DriverOptions, IngestArticle};
use newsdedup::store::{RedisStore, SimilarityIndex};

/// A preprocessed article record as it arrives over stdin (§6's external
/// interface), one JSON object per line. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct PreprocessedArticle {
    id: String,
    headline: String,
    timestamp: i64,
    tag_company: Vec<String>,
    text_body_stemmed: Vec<String>,
}

impl From<PreprocessedArticle> for IngestArticle {
    fn from(article: PreprocessedArticle) -> Self {
        Self {
            id: article.id,
            headline: article.headline,
            timestamp: article.timestamp,
            tags: article.tag_company,
            tokens: article.text_body_stemmed,
        }
    }
}

fn read_articles_from_stdin() -> anyhow::Result<Vec<IngestArticle>> {
    let stdin = io::stdin();
    let mut articles = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read line from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PreprocessedArticle =
            serde_json::from_str(&line).context("failed to parse preprocessed article record")?;
        articles.push(record.into());
    }
    Ok(articles)
}

fn run(config: &Config, telemetry: &Telemetry) -> anyhow::Result<()> {
    let store = RedisStore::connect(config.redis_server())
        .with_context(|| format!("failed to connect to {}", config.redis_server()))?;
    let index = SimilarityIndex::new(&store);
    let metrics = telemetry.metrics();

    let articles = read_articles_from_stdin()?;

    let options = DriverOptions {
        time_window_secs: i64::try_from(config.time_window().as_secs())
            .unwrap_or(i64::MAX),
        duplicate_threshold: config.duplicate_threshold(),
        log_debug: config.log_debug(),
        parameter_seed: 0x6e65_7773_6465_7570,
    };

    let report = driver::run_batch(
        &index,
        &metrics,
        options,
        config.min_hash_k(),
        config.lsh_num_bands(),
        config.lsh_band_width(),
        config.lsh_num_buckets(),
        articles,
    )?;

    info!(
        articles_ingested = report.articles_ingested,
        articles_skipped = report.articles_skipped,
        tags_processed = report.tags_processed,
        tags_skipped_singleton = report.tags_skipped_singleton,
        pairs_considered = report.pairs_considered,
        pairs_memoized_skipped = report.pairs_memoized_skipped,
        jaccard_computed = report.jaccard_computed,
        duplicates_written = report.duplicates_written,
        "batch report"
    );

    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let subcommand = args.get(1).map(String::as_str);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            std::process::exit(2);
        }
    };

    let telemetry = match Telemetry::new(config.log_debug()) {
        Ok(telemetry) => telemetry,
        Err(error) => {
            eprintln!("failed to initialize telemetry: {error}");
            std::process::exit(2);
        }
    };
    newsdedup::observability::tracing::install_panic_hook();

    if let Err(error) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.batch_worker_threads().get())
        .build_global()
    {
        error!(error = %error, "failed to size the global worker pool, using rayon's default");
    }

    match subcommand {
        Some("batch") | None => match run(&config, &telemetry) {
            Ok(()) => std::process::exit(0),
            Err(error) => {
                error!(error = %error, "batch run failed");
                let exit_code = if error.downcast_ref::<DriverError>().is_some() {
                    1
                } else {
                    2
                };
                std::process::exit(exit_code);
            }
        },
        Some(other) => {
            eprintln!("unknown subcommand: {other}");
            eprintln!("usage: newsdedup batch");
            std::process::exit(2);
        }
    }
}
