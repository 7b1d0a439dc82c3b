//! Loads the features of one map view and prints them as GeoJSON.
//!
//! Usage: `verdemap --bbox W,S,E,N --zoom Z [--category NAME] [--cache-dir DIR]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use verdemap::{
    data::feature::feature_collection, Category, FetchOptions, FileStore, LoaderBuilder,
    LoaderConfig, LoaderProfile, Viewport,
};

#[derive(Parser, Debug)]
#[command(name = "verdemap")]
#[command(about = "Load one viewport from a paginated WKT feature API")]
struct Args {
    /// API root, e.g. https://api.example.org/v1
    #[arg(long, env = "VERDEMAP_BASE_URL")]
    base_url: Option<String>,

    /// View bounds as west,south,east,north in degrees
    #[arg(long, value_delimiter = ',', num_args = 4, allow_negative_numbers = true)]
    bbox: Vec<f64>,

    /// Map zoom level (fractional zooms are fine)
    #[arg(long)]
    zoom: f64,

    /// Load only this category instead of the zoom's default set
    #[arg(long)]
    category: Option<Category>,

    /// Language for feature titles
    #[arg(long)]
    language: Option<String>,

    /// Override the zoom's page size
    #[arg(long)]
    page_size: Option<u32>,

    /// Override the zoom's page budget
    #[arg(long)]
    max_pages: Option<u32>,

    /// Keep a persistent tile cache in this directory
    #[arg(long, env = "VERDEMAP_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// JSON configuration file; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the low-bandwidth profile
    #[arg(long)]
    low_bandwidth: bool,

    /// Clear the cache before loading
    #[arg(long)]
    clear_cache: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let [west, south, east, north] = args.bbox.as_slice() else {
        bail!("--bbox needs exactly four values: west,south,east,north");
    };
    if west >= east || south >= north {
        bail!("--bbox must satisfy west < east and south < north");
    }
    let viewport = Viewport::from_wsen(*west, *south, *east, *north, args.zoom);

    let mut builder = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config = LoaderConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?;
            LoaderBuilder::new().with_config(config)
        }
        None if args.low_bandwidth => LoaderBuilder::new().with_profile(LoaderProfile::LowBandwidth),
        None => LoaderBuilder::new(),
    };

    if let Some(base_url) = &args.base_url {
        builder = builder.with_base_url(base_url.clone());
    }
    if let Some(language) = &args.language {
        builder = builder.with_language(language.clone());
    }
    if let Some(dir) = &args.cache_dir {
        let store = FileStore::open(dir)
            .await
            .with_context(|| format!("opening cache directory {}", dir.display()))?;
        builder = builder.with_store(Arc::new(store));
    }

    let loader = builder.build().await.context("building loader")?;

    if args.clear_cache {
        loader.clear_cache().await;
    }

    let options = FetchOptions {
        language: args.language.clone(),
        page_size: args.page_size,
        max_pages: args.max_pages,
    };

    let features = loader
        .load_viewport_data(&viewport, args.category, &options)
        .await
        .context("load was superseded")?;

    let stats = loader.cache_stats().await;
    log::info!(
        "loaded {} features at zoom {} ({} cached tiles)",
        features.len(),
        args.zoom,
        stats.total_records
    );

    let doc = feature_collection(&features);
    let text = if args.pretty {
        serde_json::to_string_pretty(&doc)?
    } else {
        serde_json::to_string(&doc)?
    };
    println!("{}", text);

    Ok(())
}
