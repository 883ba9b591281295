use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use stitch_api::{ApiClient, ClosetSource, FeedSource};
use stitch_core::{Category, CredentialProvider, MemoryCredentials, config_file};
use stitch_pager::{CursorPager, LoadOutcome, PageSource};
use stitch_pipeline::{
    CommitOutcome, PipelineError, PipelineOptions, RegistrationPipeline, TaskStatus,
};

mod output;

use output::ColorMode;

/// Command-line client for the closet service
#[derive(Parser, Debug)]
#[command(name = "stitch", version, about, long_about = None)]
struct Cli {
    /// API base URL, e.g. https://host/api/v1
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer access token
    #[arg(long, global = true)]
    token: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the feed home timeline
    Feeds {
        /// Items per page; defaults to `paging.page_size` from the config
        #[arg(long)]
        limit: Option<usize>,

        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },

    /// List a closet, optionally filtered by category
    Closet {
        /// Category filter: ALL, TOP, BOTTOM, ONEPIECE, SHOES, ACCESSORY, ETC
        #[arg(long, default_value = "ALL")]
        category: String,

        /// Items per page; defaults to `paging.page_size` from the config
        #[arg(long)]
        limit: Option<usize>,

        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: usize,

        /// Another user's closet instead of your own
        #[arg(long)]
        user: Option<u64>,
    },

    /// Register clothes from image files: upload, analyze, review, save
    Register {
        /// Image files to analyze (PNG or JPEG)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Save every completed item after review
        #[arg(long)]
        save: bool,

        /// Product name applied to every saved item
        #[arg(long)]
        name: Option<String>,

        /// Brand applied to every saved item
        #[arg(long)]
        brand: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let color = ColorMode(!cli.no_color);
    let config = config_file::load_config();
    let api_config = config.api.clone().unwrap_or_default();

    let base_url = cli
        .base_url
        .or_else(|| std::env::var("STITCH_BASE_URL").ok())
        .or(api_config.base_url)
        .unwrap_or_else(|| "http://localhost:8080/api/v1".to_string());
    let token = cli
        .token
        .or_else(|| std::env::var("STITCH_ACCESS_TOKEN").ok())
        .or(api_config.access_token);

    let credentials = Arc::new(MemoryCredentials::default());
    if let Some(token) = token {
        credentials.store(token);
    }
    let mut client = ApiClient::new(base_url, credentials);
    if let Some(secs) = api_config.request_timeout_secs {
        client = client.with_timeout(Duration::from_secs(secs));
    }
    let client = Arc::new(client);

    let page_size = config
        .paging
        .as_ref()
        .and_then(|p| p.page_size)
        .map(|v| v as usize);

    match cli.command {
        Command::Feeds { limit, pages } => {
            let limit = limit.or(page_size).unwrap_or(12);
            let source = Arc::new(FeedSource::new(client, limit));
            let pager = CursorPager::new(source);
            drain_pages(&pager, pages).await?;
            let snapshot = pager.snapshot();
            output::print_feeds(&mut std::io::stdout(), &snapshot.items, color)?;
            if snapshot.has_more {
                println!("More feeds available; pass --pages to fetch further.");
            }
            Ok(())
        }
        Command::Closet {
            category,
            limit,
            pages,
            user,
        } => {
            let category = parse_category(&category)?;
            let limit = limit.or(page_size).unwrap_or(12);
            let source: Arc<dyn PageSource<_>> = match user {
                Some(user_id) => Arc::new(ClosetSource::for_user(client, user_id, category, limit)),
                None => Arc::new(ClosetSource::mine(client, category, limit)),
            };
            let pager = CursorPager::new(source);
            drain_pages(&pager, pages).await?;
            let snapshot = pager.snapshot();
            output::print_clothes(&mut std::io::stdout(), &snapshot.items, color)?;
            if snapshot.has_more {
                println!("More items available; pass --pages to fetch further.");
            }
            Ok(())
        }
        Command::Register {
            images,
            save,
            name,
            brand,
        } => register(client, &config, images, save, name, brand, color).await,
    }
}

/// Load up to `pages` pages, stopping early on exhaustion.
async fn drain_pages<T: stitch_core::PageItem>(
    pager: &CursorPager<T>,
    pages: usize,
) -> anyhow::Result<()> {
    for _ in 0..pages {
        match pager.load_more().await {
            LoadOutcome::Loaded { .. } => {}
            LoadOutcome::Skipped(_) => break,
            LoadOutcome::Failed => {
                let message = pager.error().unwrap_or_else(|| "unknown error".to_string());
                bail!("page load failed: {message}");
            }
        }
    }
    Ok(())
}

fn parse_category(value: &str) -> anyhow::Result<Category> {
    match value.to_ascii_uppercase().as_str() {
        "ALL" => Ok(Category::All),
        "TOP" => Ok(Category::Top),
        "BOTTOM" => Ok(Category::Bottom),
        "ONEPIECE" => Ok(Category::Onepiece),
        "SHOES" => Ok(Category::Shoes),
        "ACCESSORY" => Ok(Category::Accessory),
        "ETC" => Ok(Category::Etc),
        other => bail!("unknown category: {other}"),
    }
}

fn guess_mime(path: &Path) -> anyhow::Result<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok("image/png"),
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        _ => bail!("unsupported image file: {}", path.display()),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

async fn register(
    client: Arc<ApiClient>,
    config: &config_file::ConfigFile,
    images: Vec<PathBuf>,
    save: bool,
    name: Option<String>,
    brand: Option<String>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let upload_config = config.upload.clone().unwrap_or_default();
    let mut options = PipelineOptions::default();
    if let Some(max) = upload_config.max_staged_files {
        options.max_staged_files = max;
    }
    if let Some(secs) = upload_config.poll_interval_secs {
        options.poll_interval = Duration::from_secs(secs);
    }

    let pipeline = RegistrationPipeline::new(client.clone(), client, options);

    for path in &images {
        let mime = guess_mime(path)?;
        let bytes =
            std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        pipeline.stage_file(file_name, mime, bytes)?;
    }

    let bar = spinner(&format!("Uploading {} files...", images.len()));
    pipeline.submit().await?;
    bar.finish_with_message("Batch submitted");

    let bar = spinner("Waiting for analysis...");
    pipeline.run_poll_loop().await?;
    bar.finish_with_message("Analysis finished");

    let tasks = pipeline.tasks();
    output::print_review(&mut std::io::stdout(), &tasks, color)?;

    if !save {
        println!("Run again with --save to store the completed items.");
        return Ok(());
    }

    let mut saved = 0usize;
    for task in &tasks {
        if task.status != TaskStatus::Completed {
            continue;
        }
        pipeline.update_item(&task.task_id, |form| {
            if let Some(name) = &name {
                form.product_name = name.clone();
            }
            if let Some(brand) = &brand {
                form.brand = brand.clone();
            }
        })?;
        match pipeline.commit_item(&task.task_id).await {
            Ok(CommitOutcome::Saved) => saved += 1,
            Ok(CommitOutcome::AlreadySaved) => {}
            Err(PipelineError::MissingCategory) => {
                eprintln!("{}: no category suggested, skipped", task.task_id);
            }
            Err(err) => return Err(err.into()),
        }
    }
    println!("Saved {saved} items.");
    Ok(())
}
