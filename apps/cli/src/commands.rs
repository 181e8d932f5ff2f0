//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};

use dealboard_core::pipeline::{EnrichmentContext, EnrichmentSummary, ProgressReporter};
use dealboard_resolver::{SOURCE_CURATED, derive_slug, normalize_name};
use dealboard_search::TavilySearch;
use dealboard_shared::{
    AppConfig, Product, init_config, load_config, new_id, resolve_db_path,
    validate_openrouter_api_key, validate_search_api_key,
};
use dealboard_storage::Storage;
use dealboard_synthesis::OpenRouterClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Dealboard — enrich pitch-show products and investors from the web.
#[derive(Parser)]
#[command(
    name = "dealboard",
    version,
    about = "Search-backed enrichment for a pitch-show product database.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich stored subjects from web search and synthesis.
    Enrich {
        #[command(subcommand)]
        target: EnrichTarget,
    },

    /// Seed products or investors from a JSON file.
    Import {
        #[command(subcommand)]
        target: ImportTarget,
    },

    /// Inspect or prune the search cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage investor name aliases.
    Aliases {
        #[command(subcommand)]
        action: AliasAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Enrichment subcommands.
#[derive(Subcommand)]
pub(crate) enum EnrichTarget {
    /// Enrich products that have no enrichment data yet.
    Products {
        /// Only process products from this season.
        #[arg(long)]
        season: Option<i64>,

        /// Maximum number of products to process.
        #[arg(long)]
        limit: Option<u32>,

        /// Also re-enrich products that already have data.
        #[arg(long)]
        force: bool,

        /// Override the configured wave size for this run.
        #[arg(long)]
        wave_size: Option<u32>,
    },

    /// Enrich investor bios that are still empty.
    Investors {
        /// Maximum number of investors to process.
        #[arg(long)]
        limit: Option<u32>,

        /// Also re-enrich investors that already have a bio.
        #[arg(long)]
        force: bool,
    },
}

/// Import subcommands.
#[derive(Subcommand)]
pub(crate) enum ImportTarget {
    /// Import products from a JSON array file.
    Products {
        /// Path to the JSON file.
        #[arg(long)]
        file: PathBuf,
    },

    /// Import investors from a JSON array file.
    Investors {
        /// Path to the JSON file.
        #[arg(long)]
        file: PathBuf,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show per-entity-type cache counters.
    Stats,
    /// Delete expired cache rows.
    Prune,
}

/// Alias subcommands.
#[derive(Subcommand)]
pub(crate) enum AliasAction {
    /// List all known aliases.
    List,
    /// Map a name variant to a canonical investor slug.
    Add {
        /// The name variant as it appears in search results or payloads.
        alias: String,

        /// Canonical investor slug the variant should resolve to.
        slug: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dealboard=info",
        1 => "dealboard=debug",
        _ => "dealboard=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich { target } => match target {
            EnrichTarget::Products {
                season,
                limit,
                force,
                wave_size,
            } => cmd_enrich_products(season, limit, force, wave_size).await,
            EnrichTarget::Investors { limit, force } => cmd_enrich_investors(limit, force).await,
        },
        Command::Import { target } => match target {
            ImportTarget::Products { file } => cmd_import_products(&file).await,
            ImportTarget::Investors { file } => cmd_import_investors(&file).await,
        },
        Command::Cache { action } => match action {
            CacheAction::Stats => cmd_cache_stats().await,
            CacheAction::Prune => cmd_cache_prune().await,
        },
        Command::Aliases { action } => match action {
            AliasAction::List => cmd_aliases_list().await,
            AliasAction::Add { alias, slug } => cmd_aliases_add(&alias, &slug).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Enrichment commands
// ---------------------------------------------------------------------------

async fn cmd_enrich_products(
    season: Option<i64>,
    limit: Option<u32>,
    force: bool,
    wave_size: Option<u32>,
) -> Result<()> {
    let mut config = load_config()?;
    validate_search_api_key(&config)?;
    validate_openrouter_api_key(&config)?;
    if let Some(size) = wave_size {
        config.defaults.wave_size = size.max(1);
    }

    info!(season = ?season, limit = ?limit, force, "enriching products");

    let ctx = build_context(&config).await?;
    let reporter = CliProgress::new();
    let summary = dealboard_core::enrich_products(ctx, season, limit, force, &reporter).await?;
    reporter.finish();

    print_summary("Product", &summary);
    Ok(())
}

async fn cmd_enrich_investors(limit: Option<u32>, force: bool) -> Result<()> {
    let config = load_config()?;
    validate_search_api_key(&config)?;
    validate_openrouter_api_key(&config)?;

    info!(limit = ?limit, force, "enriching investors");

    let ctx = build_context(&config).await?;
    let reporter = CliProgress::new();
    let summary = dealboard_core::enrich_investors(ctx, limit, force, &reporter).await?;
    reporter.finish();

    print_summary("Investor", &summary);
    Ok(())
}

/// Wire storage and the two HTTP backends into an enrichment context.
async fn build_context(config: &AppConfig) -> Result<Arc<EnrichmentContext>> {
    let db_path = resolve_db_path(config)?;
    let storage = Arc::new(Storage::open(&db_path).await?);
    let search = Arc::new(TavilySearch::from_config(&config.search)?);
    let generation = Arc::new(OpenRouterClient::from_config(&config.openrouter)?);
    Ok(Arc::new(
        EnrichmentContext::new(storage, search, generation, config).await?,
    ))
}

fn print_summary(label: &str, summary: &EnrichmentSummary) {
    println!();
    println!("  {label} enrichment finished");
    println!("  Updated:   {}", summary.updated);
    println!("  Skipped:   {}", summary.skipped.len());
    println!("  Failed:    {}", summary.failed.len());
    println!(
        "  Cache:     {} hits / {} misses",
        summary.cache_hits, summary.cache_misses
    );
    println!(
        "  Tokens:    {} prompt / {} completion",
        summary.usage.prompt_tokens, summary.usage.completion_tokens
    );
    println!("  Est. cost: ${:.4}", summary.estimated_cost);
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    for (name, reason) in &summary.skipped {
        println!("    skipped: {name} ({reason})");
    }
    for (name, reason) in &summary.failed {
        println!("    failed:  {name} ({reason})");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, label: &str) {
        self.spinner.set_message(label.to_string());
    }

    fn entity(&self, name: &str, current: usize, total: usize, outcome: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {name}: {outcome}"));
    }
}

// ---------------------------------------------------------------------------
// Import commands
// ---------------------------------------------------------------------------

/// One product row in an import file.
#[derive(Debug, Deserialize)]
struct ProductImport {
    name: String,
    #[serde(default)]
    season: Option<i64>,
    #[serde(default)]
    episode: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    ask_amount: Option<f64>,
    #[serde(default)]
    ask_equity: Option<f64>,
}

/// One investor row in an import file.
#[derive(Debug, Deserialize)]
struct InvestorImport {
    name: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

async fn cmd_import_products(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let records: Vec<ProductImport> = serde_json::from_str(&content)
        .map_err(|e| eyre!("'{}' is not a JSON array of products: {e}", file.display()))?;

    let config = load_config()?;
    let storage = Storage::open(&resolve_db_path(&config)?).await?;

    let mut imported = 0usize;
    let mut skipped = 0usize;
    for record in records {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        let slug = derive_slug(&normalize_name(&name));
        if slug.is_empty() {
            warn!(name = %name, "name yields no slug, skipping record");
            skipped += 1;
            continue;
        }
        let now = Utc::now();
        let product = Product {
            id: new_id(),
            name,
            slug,
            season: record.season,
            episode: record.episode,
            description: record.description,
            category: record.category,
            website: record.website,
            ask_amount: record.ask_amount,
            ask_equity: record.ask_equity,
            deal_amount: None,
            deal_equity: None,
            deal_status: None,
            enriched_at: None,
            created_at: now,
            updated_at: now,
        };
        storage.upsert_product(&product).await?;
        imported += 1;
    }

    info!(imported, skipped, file = %file.display(), "product import finished");
    println!("Imported {imported} products ({skipped} skipped).");
    Ok(())
}

async fn cmd_import_investors(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let records: Vec<InvestorImport> = serde_json::from_str(&content)
        .map_err(|e| eyre!("'{}' is not a JSON array of investors: {e}", file.display()))?;

    let config = load_config()?;
    let storage = Storage::open(&resolve_db_path(&config)?).await?;

    let mut imported = 0usize;
    let mut skipped = 0usize;
    for record in records {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        let slug = record
            .slug
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| derive_slug(&normalize_name(&name)));
        if slug.is_empty() {
            warn!(name = %name, "name yields no slug, skipping record");
            skipped += 1;
            continue;
        }

        let mut investor = storage.get_or_create_investor(&name, &slug, false).await?;
        let bio = record
            .bio
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        if let Some(bio) = bio {
            if investor.bio.is_none() {
                investor.bio = Some(bio);
                investor.updated_at = Utc::now();
                storage.update_investor(&investor).await?;
            }
        }
        imported += 1;
    }

    info!(imported, skipped, file = %file.display(), "investor import finished");
    println!("Imported {imported} investors ({skipped} skipped).");
    Ok(())
}

// ---------------------------------------------------------------------------
// Cache commands
// ---------------------------------------------------------------------------

async fn cmd_cache_stats() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&resolve_db_path(&config)?).await?;
    let stats = storage.cache_stats(Utc::now()).await?;

    if stats.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    println!();
    println!("  {:<10} {:>7} {:>7} {:>9}", "type", "total", "live", "expired");
    for stat in stats {
        println!(
            "  {:<10} {:>7} {:>7} {:>9}",
            stat.entity_type, stat.total, stat.live, stat.expired
        );
    }
    println!();
    Ok(())
}

async fn cmd_cache_prune() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&resolve_db_path(&config)?).await?;
    let removed = storage.prune_search_cache(Utc::now()).await?;

    info!(removed, "cache prune finished");
    println!("Pruned {removed} expired cache rows.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Alias commands
// ---------------------------------------------------------------------------

async fn cmd_aliases_list() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&resolve_db_path(&config)?).await?;
    let aliases = storage.list_aliases().await?;

    if aliases.is_empty() {
        println!("No aliases defined.");
        return Ok(());
    }

    println!();
    println!("  {:<28} {:<24} {}", "alias", "slug", "source");
    for alias in aliases {
        println!("  {:<28} {:<24} {}", alias.alias, alias.slug, alias.source);
    }
    println!();
    Ok(())
}

async fn cmd_aliases_add(alias: &str, slug: &str) -> Result<()> {
    let normalized = normalize_name(alias);
    if normalized.is_empty() {
        return Err(eyre!("alias must not be empty"));
    }
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(eyre!("slug must not be empty"));
    }

    let config = load_config()?;
    let storage = Storage::open(&resolve_db_path(&config)?).await?;
    storage.upsert_alias(&normalized, slug, SOURCE_CURATED).await?;

    if storage.get_investor_by_slug(slug).await?.is_none() {
        println!("Note: no investor with slug '{slug}' exists yet; the first resolved mention will create it.");
    }
    println!("Alias '{normalized}' now resolves to '{slug}'.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
