use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use toxwatch::analysis::UserAggregator;
use toxwatch::api::{mcp, ToolService};
use toxwatch::batch::{dataset, BatchJob, BatchOptions, CsvCheckpoint};
use toxwatch::config::Config;
use toxwatch::monitor::alert::TOP_ALERT_ITEMS;
use toxwatch::monitor::shutdown::install_signal_handlers;
use toxwatch::monitor::{
    AlertSink, FanoutSink, InboxMonitor, MonitorSettings, ReplySink, Shutdown, TerminalSink,
};
use toxwatch::output::terminal;
use toxwatch::platform::{Platform, RedditClient};
use toxwatch::toxicity::onnx::model_files_present;
use toxwatch::toxicity::{download, ToxicityClassifier};

/// toxwatch: toxicity detection for Reddit inboxes, user histories and
/// offline datasets.
#[derive(Parser)]
#[command(name = "toxwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the bot's inbox and analyze everyone who messages it
    Monitor,

    /// Analyze a Reddit user's recent activity
    Analyze {
        /// Username, with or without the u/ prefix
        username: String,

        /// Max comments and max submissions to fetch (default: TOXWATCH_MAX_ITEMS)
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Classify a single piece of text
    Classify {
        text: String,
    },

    /// Score a CSV dataset, resuming from the output file if it exists
    Batch {
        /// Input CSV
        #[arg(long)]
        input: PathBuf,

        /// Output (checkpoint) CSV
        #[arg(long)]
        output: PathBuf,

        /// Text column name (default: TOXWATCH_TEXT_COLUMN)
        #[arg(long)]
        column: Option<String>,

        /// Rows per chunk (default: TOXWATCH_CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Stop after this many chunks; run again to continue
        #[arg(long)]
        max_chunks: Option<usize>,
    },

    /// Clean a CSV dataset and report length statistics
    Preprocess {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Text column name (default: TOXWATCH_TEXT_COLUMN)
        #[arg(long)]
        column: Option<String>,
    },

    /// Serve the classify/analyze tools over MCP on stdin/stdout
    ServeMcp,

    /// Download the ONNX toxicity model into TOXWATCH_MODEL_DIR
    DownloadModel {
        /// Target directory (default: TOXWATCH_MODEL_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Start the JSON API server
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout is reserved for results and MCP frames
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("toxwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Monitor => {
            config.require_reddit_auth()?;
            let platform: Arc<dyn Platform> = Arc::new(RedditClient::from_config(&config)?);
            let aggregator = build_aggregator(&config, platform.clone());

            let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(TerminalSink)];
            if config.reply_to_sender {
                sinks.push(Box::new(ReplySink::new(platform.clone())));
            }

            let (shutdown, listener) = Shutdown::new();
            install_signal_handlers(shutdown);

            println!(
                "{} polling every {}s (Ctrl-C to stop)",
                "toxwatch monitor".bold(),
                config.poll_interval.as_secs()
            );
            let mut monitor = InboxMonitor::new(
                platform,
                aggregator,
                Box::new(FanoutSink::new(sinks)),
                MonitorSettings::from_config(&config),
            );
            monitor.run_forever(listener).await;
        }

        Commands::Analyze {
            username,
            max_items,
        } => {
            config.require_reddit_read()?;
            let platform: Arc<dyn Platform> = Arc::new(RedditClient::from_config(&config)?);
            let aggregator = build_aggregator(&config, platform);
            let max_items = max_items.unwrap_or(config.max_items).max(1);

            println!("Analyzing u/{username} (up to {max_items} comments and submissions)...");
            let outcome = aggregator.analyze(&username, max_items).await;
            terminal::display_outcome(&username, &outcome, TOP_ALERT_ITEMS);
        }

        Commands::Classify { text } => {
            let classifier = ToxicityClassifier::from_config(&config);
            let result = classifier.classify(&text).await;
            terminal::display_classification(&text, &result);
        }

        Commands::Batch {
            input,
            output,
            column,
            chunk_size,
            max_chunks,
        } => {
            let column = column.unwrap_or_else(|| config.text_column.clone());
            let inputs = dataset::read_text_column(&input, &column)?;
            let classifier = ToxicityClassifier::from_config(&config);

            let options = BatchOptions {
                chunk_size: chunk_size.unwrap_or(config.chunk_size).max(1),
                max_chunks,
                ..Default::default()
            };

            let (shutdown, listener) = Shutdown::new();
            install_signal_handlers(shutdown);

            let job = BatchJob::new(classifier, options)
                .with_progress(progress_bar(inputs.len()))
                .with_shutdown(listener);
            let mut checkpoint = CsvCheckpoint::new(&output);
            let summary = job
                .run(&inputs, &mut checkpoint)
                .await
                .with_context(|| format!("Batch scoring into {} failed", output.display()))?;

            terminal::display_batch_summary(&summary);
            info!(output = %output.display(), "Results saved");
        }

        Commands::Preprocess {
            input,
            output,
            column,
        } => {
            let column = column.unwrap_or_else(|| config.text_column.clone());
            let stats = dataset::preprocess(&input, &output, &column)?;
            terminal::display_preprocess_stats(&stats);
            println!("\nCleaned dataset written to {}", output.display());
        }

        Commands::ServeMcp => {
            config.require_reddit_read()?;
            let service = build_service(&config)?;
            info!("Serving MCP on stdio");
            mcp::run_stdio(service).await?;
        }

        Commands::DownloadModel { dir } => {
            let dir = dir.unwrap_or_else(|| config.model_dir.clone());
            println!("{} into {}", "Fetching toxicity model".bold(), dir.display());
            let fetched = download::download_model(&dir).await?;
            if model_files_present(&dir) {
                println!("\nModel ready ({fetched} file(s) downloaded).");
            }
        }

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            config.require_reddit_read()?;
            let service = build_service(&config)?;
            toxwatch::web::run_server(service, port, &bind).await?;
        }
    }

    Ok(())
}

fn build_aggregator(config: &Config, platform: Arc<dyn Platform>) -> UserAggregator {
    UserAggregator::new(platform, ToxicityClassifier::from_config(config))
}

fn build_service(config: &Config) -> Result<ToolService> {
    let platform: Arc<dyn Platform> = Arc::new(RedditClient::from_config(config)?);
    Ok(ToolService::from_config(
        build_aggregator(config, platform),
        config,
    ))
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("  Scoring [{bar:30}] {pos}/{len} ({eta})") {
        pb.set_style(style);
    }
    pb
}
