use anyhow::Result;
use clap::Parser;
use newsroom::{
    AppConfig, CategoryStore, ContentEditor, FeedFetcher, IngestionCoordinator, Scheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "newsroom", about = "RSS news ingestion pipeline")]
struct Args {
    /// Directory for category records and daily archives
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// JSON file mapping categories to feed URLs, replacing the built-in table
    #[arg(long)]
    feeds: Option<PathBuf>,

    /// Process every category once and exit instead of running the scheduler
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(dir) = args.archive_dir {
        config.store.archive_dir = dir;
    }
    if let Some(path) = &args.feeds {
        config.load_feeds_from_file(path)?;
    }

    info!(
        "Starting newsroom: {} categories, {} sources, archive at {}",
        config.feeds.len(),
        config.total_sources(),
        config.store.archive_dir.display()
    );

    let store = Arc::new(CategoryStore::new(config.store.clone())?);
    let fetcher = FeedFetcher::new(config.fetcher.clone());
    let editor = ContentEditor::new(config.editor.clone());

    if config.editor.api_key.is_empty() {
        warn!("TOGETHER_API_KEY not set, items will pass through unedited");
    } else {
        // A failed probe is not fatal; items degrade to pass-through.
        editor.probe().await;
    }

    let coordinator = Arc::new(IngestionCoordinator::new(
        fetcher,
        editor,
        store.clone(),
        config.feeds.clone(),
        config.coordinator.clone(),
    ));

    if args.once {
        let results = coordinator.process_all_categories().await;
        for (category, ok) in &results {
            info!("{}: {}", category, if *ok { "ok" } else { "failed" });
        }
        let stats = store.stats().await;
        info!(
            "Cache now holds {} items across {} categories",
            stats.total_items,
            stats.categories.len()
        );
        return Ok(());
    }

    let scheduler = Scheduler::new(coordinator, store, config.scheduler.clone());
    scheduler.start().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.stop().await;

    Ok(())
}
