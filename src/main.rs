use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quick_bits::audio::AudioValidator;
use quick_bits::config::Config;
use quick_bits::ledger::UploadLedger;
use quick_bits::pipeline::ExtractionPipeline;
use quick_bits::platforms::create_uploaders;
use quick_bits::processing::{load_backlog, BatchProcessor};
use quick_bits::upload::UploadOrchestrator;
use quick_bits::video::FfmpegExtractor;
use quick_bits::youtube::{VideoSource, YouTubeClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let matches = Command::new("Quick Bits Publisher")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Extracts the Quick Bits segment from new channel videos and publishes it as a vertical clip")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: quick-bits.toml, then environment)")
        )
        .arg(
            Arg::new("working-dir")
                .short('w')
                .long("working-dir")
                .value_name("DIR")
                .help("Directory for downloads and extracted clips")
        )
        .arg(
            Arg::new("backlog")
                .short('b')
                .long("backlog")
                .value_name("FILE")
                .help("JSON file of older videos to work through after the latest ones")
        )
        .arg(
            Arg::new("max-videos")
                .short('m')
                .long("max-videos")
                .value_name("NUM")
                .help("Maximum number of videos processed in this run")
                .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("URL")
                .help("Upload ledger database URL (e.g. sqlite://quick-bits.db)")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "quick_bits=debug,info"
    } else {
        "quick_bits=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(dir) = matches.get_one::<String>("working-dir") {
        config.pipeline.working_dir = PathBuf::from(dir);
    }
    if let Some(backlog) = matches.get_one::<String>("backlog") {
        config.batch.backlog_file = Some(PathBuf::from(backlog));
    }
    if let Some(max_videos) = matches.get_one::<usize>("max-videos") {
        config.batch.max_videos_per_run = *max_videos;
    }
    if let Some(database) = matches.get_one::<String>("database") {
        config.ledger.database_url = database.clone();
    }

    config.validate()?;

    info!("🚀 Quick Bits publisher starting...");
    info!("{}", config.summary());

    let ledger = Arc::new(
        UploadLedger::open(&config.ledger.database_url, config.ledger.platforms.clone())
            .await
            .context("Cannot open upload ledger")?,
    );

    let source: Arc<dyn VideoSource> = Arc::new(YouTubeClient::new(&config.channel, config.pipeline.yt_dlp_path.clone())?);
    let pipeline = ExtractionPipeline::new(
        source.clone(),
        Arc::new(FfmpegExtractor::new(config.pipeline.ffmpeg_path.clone())),
        Arc::new(
            AudioValidator::new(config.pipeline.ffmpeg_path.clone(), config.pipeline.ffprobe_path.clone())
                .with_threshold(config.pipeline.audible_threshold_db),
        ),
        config.pipeline.working_dir.clone(),
    )
    .with_chapter_names(config.pipeline.chapter_names.clone())
    .with_padding(config.pipeline.clip_padding_seconds);

    let orchestrator = UploadOrchestrator::new(ledger.clone(), create_uploaders(&config)?);

    let backlog = match &config.batch.backlog_file {
        Some(path) => load_backlog(path)
            .await
            .with_context(|| format!("Cannot load backlog {}", path.display()))?,
        None => Vec::new(),
    };

    let processor = BatchProcessor::new(
        source,
        pipeline,
        orchestrator,
        ledger.clone(),
        config.batch.max_videos_per_run,
    )
    .with_backlog(backlog);

    let result = processor.run().await;

    // The processor holds the other ledger handle
    drop(processor);
    match Arc::try_unwrap(ledger) {
        Ok(ledger) => ledger.close().await,
        Err(_) => warn!("Upload ledger still shared at shutdown"),
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!("Batch run failed: {}", e);
            return Err(e.into());
        }
    };

    info!("🎉 Run completed in {:.2}s", summary.total_time.as_secs_f64());
    info!("✅ Published: {}", summary.published);
    info!("⚠️ Partially published: {}", summary.partially_published);
    info!("⏭️ Skipped: {}", summary.skipped);
    info!("❌ Failed: {}", summary.failed);

    Ok(())
}
