//! Wave-based enrichment driver.
//!
//! Each run loads its subjects, works through them in concurrent
//! waves (cache, search, synthesize, resolve, persist), and records a
//! run row with aggregate stats. One subject's failure never aborts
//! its wave; failures land in the summary with their reasons.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use dealboard_resolver::EntityResolver;
use dealboard_search::{QueryCache, SearchBackend, combine};
use dealboard_shared::{
    AppConfig, DealboardError, EnrichSettings, EntityType, Investor, Product, ProductInvestor,
    Result, SearchHit, TokenUsage,
};
use dealboard_storage::Storage;
use dealboard_synthesis::{GenerationBackend, SynthesisOptions, Synthesizer, UsageAccumulator};

use crate::prompts::{INVESTOR_SYSTEM, InvestorPrompt, PRODUCT_SYSTEM, ProductPrompt};
use crate::schemas::{InvestorProfile, ProductEnrichment};

// ---------------------------------------------------------------------------
// Context and results
// ---------------------------------------------------------------------------

/// Everything a wave worker needs, assembled once per run.
pub struct EnrichmentContext {
    pub storage: Arc<Storage>,
    pub cache: QueryCache,
    pub search: Arc<dyn SearchBackend>,
    pub synthesizer: Synthesizer,
    pub resolver: EntityResolver,
    pub usage: Arc<UsageAccumulator>,
    pub settings: EnrichSettings,
}

impl EnrichmentContext {
    /// Wire up a context from configuration and the two backends.
    pub async fn new(
        storage: Arc<Storage>,
        search: Arc<dyn SearchBackend>,
        generation: Arc<dyn GenerationBackend>,
        config: &AppConfig,
    ) -> Result<Self> {
        let usage = Arc::new(UsageAccumulator::with_pricing(config.pricing.clone()));
        Ok(Self {
            cache: QueryCache::new(Arc::clone(&storage), config.cache.clone()),
            search,
            synthesizer: Synthesizer::new(generation, Arc::clone(&usage)),
            resolver: EntityResolver::new(Arc::clone(&storage)).await?,
            usage,
            settings: EnrichSettings::from(config),
            storage,
        })
    }
}

/// Aggregated outcome of one enrichment run.
#[derive(Debug, Default)]
pub struct EnrichmentSummary {
    pub updated: usize,
    /// Subjects set aside with a reason (currently: insufficient data).
    pub skipped: Vec<(String, String)>,
    /// Subjects that errored, with the failure reason.
    pub failed: Vec<(String, String)>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub usage: TokenUsage,
    pub estimated_cost: f64,
    pub elapsed: Duration,
}

impl EnrichmentSummary {
    pub fn processed(&self) -> usize {
        self.updated + self.skipped.len() + self.failed.len()
    }
}

/// Callback surface for live run output.
pub trait ProgressReporter: Send + Sync {
    /// A new phase of the run began.
    fn phase(&self, label: &str);
    /// One subject finished with the given outcome word.
    fn entity(&self, name: &str, current: usize, total: usize, outcome: &str);
}

/// No-op reporter for tests and non-interactive callers.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _label: &str) {}
    fn entity(&self, _name: &str, _current: usize, _total: usize, _outcome: &str) {}
}

// ---------------------------------------------------------------------------
// Product enrichment
// ---------------------------------------------------------------------------

/// Enrich products that still need it (all matching ones with `force`).
#[instrument(skip_all, fields(force = force))]
pub async fn enrich_products(
    ctx: Arc<EnrichmentContext>,
    season: Option<i64>,
    limit: Option<u32>,
    force: bool,
    progress: &dyn ProgressReporter,
) -> Result<EnrichmentSummary> {
    let subjects = ctx
        .storage
        .list_products_for_enrichment(force, season, limit)
        .await?;
    let total = subjects.len();
    if total == 0 {
        info!("no products need enrichment");
        return Ok(EnrichmentSummary::default());
    }

    progress.phase(&format!("enriching {total} products"));
    let run_id = ctx.storage.insert_enrichment_run(EntityType::Product).await?;
    let started = Instant::now();
    let mut summary = EnrichmentSummary::default();

    let wave_size = ctx.settings.wave_size.max(1) as usize;
    let wave_count = total.div_ceil(wave_size);
    let mut processed = 0usize;

    for (wave_index, wave) in subjects.chunks(wave_size).enumerate() {
        debug!(wave = wave_index + 1, of = wave_count, size = wave.len(), "starting wave");

        let mut handles: Vec<JoinHandle<(String, Result<bool>)>> = Vec::new();
        for product in wave {
            let ctx = Arc::clone(&ctx);
            let product = product.clone();
            handles.push(tokio::spawn(async move {
                let outcome = enrich_one_product(&ctx, &product).await;
                (product.name, outcome)
            }));
        }

        for handle in handles {
            processed += 1;
            match handle.await {
                Ok((name, Ok(cache_hit))) => {
                    summary.updated += 1;
                    if cache_hit {
                        summary.cache_hits += 1;
                    } else {
                        summary.cache_misses += 1;
                    }
                    progress.entity(&name, processed, total, "updated");
                }
                Ok((name, Err(DealboardError::InsufficientData { .. }))) => {
                    warn!(product = %name, "no usable search results, skipping");
                    progress.entity(&name, processed, total, "skipped");
                    summary.skipped.push((name, "insufficient data".to_string()));
                }
                Ok((name, Err(e))) => {
                    warn!(product = %name, error = %e, "enrichment failed");
                    progress.entity(&name, processed, total, "failed");
                    summary.failed.push((name, e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "enrichment task panicked");
                    summary.failed.push(("<task>".to_string(), e.to_string()));
                }
            }
        }

        if wave_index + 1 < wave_count && ctx.settings.wave_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(ctx.settings.wave_delay_ms)).await;
        }
    }

    finalize_run(&ctx, &run_id, &mut summary, started).await;
    info!(
        updated = summary.updated,
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        cache_hits = summary.cache_hits,
        tokens = summary.usage.total(),
        elapsed_ms = summary.elapsed.as_millis(),
        "product enrichment finished"
    );
    Ok(summary)
}

/// Run the full per-product flow. Returns whether the search context
/// came from cache.
#[instrument(skip_all, fields(product = %product.name))]
async fn enrich_one_product(ctx: &EnrichmentContext, product: &Product) -> Result<bool> {
    let query = ProductPrompt::query(product);
    let (results, cache_hit) =
        fetch_context(ctx, EntityType::Product, &product.id, &product.name, &query).await?;
    if results.is_empty() {
        return Err(DealboardError::InsufficientData {
            subject: product.name.clone(),
        });
    }

    let context = combine(&results, ctx.settings.context_max_chars);
    let options = SynthesisOptions::from(&ctx.settings);
    let outcome = ctx
        .synthesizer
        .synthesize::<ProductEnrichment>(
            PRODUCT_SYSTEM,
            &ProductPrompt::build(product, &context),
            &options,
        )
        .await;

    let Some(payload) = outcome.data else {
        let reason = outcome
            .error
            .unwrap_or_else(|| "no payload produced".to_string());
        return Err(DealboardError::Synthesis(format!(
            "giving up after {} attempt(s): {reason}",
            outcome.attempts
        )));
    };
    let payload = payload.sanitized();

    // Resolve the full link set before writing anything. A failed
    // resolution propagates and leaves the row untouched for a later run.
    let mut links: Vec<ProductInvestor> = Vec::new();
    for share in &payload.investors {
        let investor_id = ctx.resolver.resolve(&share.name).await?;
        if links.iter().any(|l| l.investor_id == investor_id) {
            debug!(investor = %share.name, "duplicate investor in payload, keeping first share");
            continue;
        }
        links.push(ProductInvestor {
            product_id: product.id.clone(),
            investor_id,
            amount: share.amount,
            equity_percent: share.equity_percent,
            is_lead: share.is_lead,
        });
    }

    // Product row first, then the links. There is no rollback between
    // the two writes; a subject caught between them needs a forced re-run.
    let mut updated = product.clone();
    updated.description = payload.description.or(updated.description);
    updated.category = payload.category.or(updated.category);
    updated.website = payload.website.or(updated.website);
    updated.deal_status = payload.deal_status.or(updated.deal_status);
    updated.deal_amount = payload.deal_amount.or(updated.deal_amount);
    updated.deal_equity = payload.deal_equity.or(updated.deal_equity);
    updated.enriched_at = Some(Utc::now());
    updated.updated_at = Utc::now();
    ctx.storage.update_product(&updated).await?;
    ctx.storage
        .replace_product_investors(&product.id, &links)
        .await?;

    debug!(links = links.len(), cache_hit, "product enriched");
    Ok(cache_hit)
}

// ---------------------------------------------------------------------------
// Investor enrichment
// ---------------------------------------------------------------------------

/// Enrich investor bios that still need it (all of them with `force`).
#[instrument(skip_all, fields(force = force))]
pub async fn enrich_investors(
    ctx: Arc<EnrichmentContext>,
    limit: Option<u32>,
    force: bool,
    progress: &dyn ProgressReporter,
) -> Result<EnrichmentSummary> {
    let subjects = ctx
        .storage
        .list_investors_for_enrichment(force, limit)
        .await?;
    let total = subjects.len();
    if total == 0 {
        info!("no investors need enrichment");
        return Ok(EnrichmentSummary::default());
    }

    progress.phase(&format!("enriching {total} investors"));
    let run_id = ctx
        .storage
        .insert_enrichment_run(EntityType::Investor)
        .await?;
    let started = Instant::now();
    let mut summary = EnrichmentSummary::default();

    let wave_size = ctx.settings.wave_size.max(1) as usize;
    let wave_count = total.div_ceil(wave_size);
    let mut processed = 0usize;

    for (wave_index, wave) in subjects.chunks(wave_size).enumerate() {
        debug!(wave = wave_index + 1, of = wave_count, size = wave.len(), "starting wave");

        let mut handles: Vec<JoinHandle<(String, Result<bool>)>> = Vec::new();
        for investor in wave {
            let ctx = Arc::clone(&ctx);
            let investor = investor.clone();
            handles.push(tokio::spawn(async move {
                let outcome = enrich_one_investor(&ctx, &investor).await;
                (investor.name, outcome)
            }));
        }

        for handle in handles {
            processed += 1;
            match handle.await {
                Ok((name, Ok(cache_hit))) => {
                    summary.updated += 1;
                    if cache_hit {
                        summary.cache_hits += 1;
                    } else {
                        summary.cache_misses += 1;
                    }
                    progress.entity(&name, processed, total, "updated");
                }
                Ok((name, Err(DealboardError::InsufficientData { .. }))) => {
                    warn!(investor = %name, "no usable search results, skipping");
                    progress.entity(&name, processed, total, "skipped");
                    summary.skipped.push((name, "insufficient data".to_string()));
                }
                Ok((name, Err(e))) => {
                    warn!(investor = %name, error = %e, "enrichment failed");
                    progress.entity(&name, processed, total, "failed");
                    summary.failed.push((name, e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "enrichment task panicked");
                    summary.failed.push(("<task>".to_string(), e.to_string()));
                }
            }
        }

        if wave_index + 1 < wave_count && ctx.settings.wave_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(ctx.settings.wave_delay_ms)).await;
        }
    }

    finalize_run(&ctx, &run_id, &mut summary, started).await;
    info!(
        updated = summary.updated,
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        cache_hits = summary.cache_hits,
        tokens = summary.usage.total(),
        elapsed_ms = summary.elapsed.as_millis(),
        "investor enrichment finished"
    );
    Ok(summary)
}

#[instrument(skip_all, fields(investor = %investor.name))]
async fn enrich_one_investor(ctx: &EnrichmentContext, investor: &Investor) -> Result<bool> {
    let query = InvestorPrompt::query(investor);
    let (results, cache_hit) = fetch_context(
        ctx,
        EntityType::Investor,
        &investor.id,
        &investor.name,
        &query,
    )
    .await?;
    if results.is_empty() {
        return Err(DealboardError::InsufficientData {
            subject: investor.name.clone(),
        });
    }

    let context = combine(&results, ctx.settings.context_max_chars);
    let options = SynthesisOptions::from(&ctx.settings);
    let outcome = ctx
        .synthesizer
        .synthesize::<InvestorProfile>(
            INVESTOR_SYSTEM,
            &InvestorPrompt::build(investor, &context),
            &options,
        )
        .await;

    let Some(profile) = outcome.data else {
        let reason = outcome
            .error
            .unwrap_or_else(|| "no payload produced".to_string());
        return Err(DealboardError::Synthesis(format!(
            "giving up after {} attempt(s): {reason}",
            outcome.attempts
        )));
    };

    let mut updated = investor.clone();
    updated.bio = profile.composed_bio().or(updated.bio);
    updated.enriched_at = Some(Utc::now());
    updated.updated_at = Utc::now();
    ctx.storage.update_investor(&updated).await?;

    debug!(cache_hit, "investor enriched");
    Ok(cache_hit)
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

/// Cache-first context fetch. Live results are written back to the
/// cache; empty responses are not cached so a later run can retry.
async fn fetch_context(
    ctx: &EnrichmentContext,
    entity_type: EntityType,
    entity_id: &str,
    entity_name: &str,
    query: &str,
) -> Result<(Vec<SearchHit>, bool)> {
    if let Some(cached) = ctx.cache.get(entity_type, query).await {
        return Ok((cached.results, true));
    }

    let results = ctx.search.search(query).await?;
    if !results.is_empty() {
        ctx.cache
            .put(
                entity_type,
                Some(entity_id),
                Some(entity_name),
                query,
                &results,
                None,
            )
            .await;
    }
    Ok((results, false))
}

/// Fill in usage totals and close out the run row.
async fn finalize_run(
    ctx: &EnrichmentContext,
    run_id: &str,
    summary: &mut EnrichmentSummary,
    started: Instant,
) {
    summary.usage = ctx.usage.snapshot();
    summary.estimated_cost = ctx.usage.estimated_cost(&ctx.settings.model);
    summary.elapsed = started.elapsed();

    let stats = serde_json::json!({
        "updated": summary.updated,
        "skipped": summary.skipped.len(),
        "failed": summary.failed.len(),
        "cache_hits": summary.cache_hits,
        "cache_misses": summary.cache_misses,
        "prompt_tokens": summary.usage.prompt_tokens,
        "completion_tokens": summary.usage.completion_tokens,
    });
    if let Err(e) = ctx
        .storage
        .finish_enrichment_run(run_id, &stats.to_string())
        .await
    {
        warn!(error = %e, "could not record run stats");
    }
}

#[cfg(test)]
mod tests {
    use dealboard_search::MockSearch;
    use dealboard_shared::{CacheConfig, new_id};
    use dealboard_synthesis::MockGeneration;
    use uuid::Uuid;

    use super::*;

    fn test_settings() -> EnrichSettings {
        EnrichSettings {
            wave_size: 4,
            wave_delay_ms: 0,
            context_max_chars: 4000,
            search_depth: "basic".to_string(),
            max_results: 5,
            model: "moonshotai/kimi-k2.5".to_string(),
            max_tokens: 1500,
            temperature: 0.2,
            retries: 0,
            retry_base_delay_ms: 1,
        }
    }

    async fn test_context(
        search: Arc<MockSearch>,
        generation: Arc<MockGeneration>,
        settings: EnrichSettings,
    ) -> (Arc<EnrichmentContext>, Arc<Storage>) {
        let path = std::env::temp_dir().join(format!("db_pipeline_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&path).await.expect("open db"));
        let usage = Arc::new(UsageAccumulator::new());
        let ctx = EnrichmentContext {
            cache: QueryCache::new(Arc::clone(&storage), CacheConfig::default()),
            search,
            synthesizer: Synthesizer::new(generation, Arc::clone(&usage)),
            resolver: EntityResolver::new(Arc::clone(&storage))
                .await
                .expect("resolver"),
            usage,
            settings,
            storage: Arc::clone(&storage),
        };
        (Arc::new(ctx), storage)
    }

    fn product(name: &str) -> Product {
        Product {
            id: new_id(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            season: Some(4),
            episode: Some(7),
            description: None,
            category: None,
            website: None,
            ask_amount: Some(100_000.0),
            ask_equity: Some(10.0),
            deal_amount: None,
            deal_equity: None,
            deal_status: None,
            enriched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn hits() -> Vec<SearchHit> {
        vec![SearchHit {
            title: "Scrub Daddy after the tank".to_string(),
            url: "https://example.com/scrub-daddy".to_string(),
            content: "Lori Greiner invested $200,000 for 20% equity.".to_string(),
            score: Some(0.97),
        }]
    }

    fn product_payload() -> String {
        serde_json::json!({
            "description": "A smiley-faced scratch-free sponge",
            "category": "household",
            "website": "https://scrubdaddy.com",
            "deal_status": "funded",
            "deal_amount": 200_000.0,
            "deal_equity": 20.0,
            "investors": [{
                "name": "Lori Greiner",
                "amount": 200_000.0,
                "equity_percent": 20.0,
                "is_lead": true,
            }],
        })
        .to_string()
    }

    #[tokio::test]
    async fn happy_path_persists_product_and_deal_links() {
        let (ctx, storage) = test_context(
            Arc::new(MockSearch::with_hits(hits())),
            Arc::new(MockGeneration::with_text(product_payload())),
            test_settings(),
        )
        .await;
        storage
            .upsert_product(&product("Scrub Daddy"))
            .await
            .expect("seed");

        let summary = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.updated, 1);
        assert!(summary.skipped.is_empty());
        assert!(summary.failed.is_empty());
        assert_eq!(summary.cache_misses, 1);
        assert_eq!(summary.usage.total(), 165);

        let stored = storage
            .get_product_by_slug("scrub-daddy")
            .await
            .expect("query")
            .expect("row");
        assert_eq!(stored.deal_status.as_deref(), Some("funded"));
        assert_eq!(stored.deal_amount, Some(200_000.0));
        assert!(stored.enriched_at.is_some());

        let links = storage
            .list_product_investors(&stored.id)
            .await
            .expect("links");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].equity_percent, Some(20.0));
        assert!(links[0].is_lead);

        let investor = storage
            .get_investor_by_slug("lori-greiner")
            .await
            .expect("query")
            .expect("auto-created investor");
        assert_eq!(links[0].investor_id, investor.id);
        assert!(investor.is_auto_created);
    }

    #[tokio::test]
    async fn repeat_run_reads_the_cache_instead_of_searching() {
        let search = Arc::new(MockSearch::with_hits(hits()));
        let (ctx, storage) = test_context(
            Arc::clone(&search),
            Arc::new(MockGeneration::with_text(product_payload())),
            test_settings(),
        )
        .await;
        storage
            .upsert_product(&product("Scrub Daddy"))
            .await
            .expect("seed");

        let first = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("first run");
        assert_eq!(first.cache_misses, 1);
        assert_eq!(search.request_count(), 1);

        let second = enrich_products(Arc::clone(&ctx), None, None, true, &SilentProgress)
            .await
            .expect("second run");
        assert_eq!(second.updated, 1);
        assert_eq!(second.cache_hits, 1);
        assert_eq!(search.request_count(), 1);
    }

    #[tokio::test]
    async fn empty_search_results_skip_the_product_without_caching() {
        let search = Arc::new(MockSearch::new());
        search.push_response(Ok(Vec::new()));
        search.push_response(Ok(hits()));
        let (ctx, storage) = test_context(
            Arc::clone(&search),
            Arc::new(MockGeneration::with_text(product_payload())),
            test_settings(),
        )
        .await;
        storage
            .upsert_product(&product("Scrub Daddy"))
            .await
            .expect("seed");

        let first = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("first run");
        assert_eq!(first.updated, 0);
        assert_eq!(first.skipped.len(), 1);
        assert_eq!(first.skipped[0].1, "insufficient data");

        let unenriched = storage
            .get_product_by_slug("scrub-daddy")
            .await
            .expect("query")
            .expect("row");
        assert!(unenriched.enriched_at.is_none());

        // The empty response was not cached, so the retry searches again.
        let second = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("second run");
        assert_eq!(second.updated, 1);
        assert_eq!(second.cache_misses, 1);
        assert_eq!(search.request_count(), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_wave() {
        let generation = Arc::new(MockGeneration::new());
        generation.push_text("this is still not json");
        generation.push_text(product_payload());

        let mut settings = test_settings();
        settings.wave_size = 1;

        let (ctx, storage) = test_context(
            Arc::new(MockSearch::with_hits(hits())),
            generation,
            settings,
        )
        .await;
        storage
            .upsert_product(&product("Aaa Widget"))
            .await
            .expect("seed a");
        storage
            .upsert_product(&product("Bbb Widget"))
            .await
            .expect("seed b");

        let summary = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "Aaa Widget");
        assert!(summary.failed[0].1.contains("json extraction error"));

        let survivor = storage
            .get_product_by_slug("bbb-widget")
            .await
            .expect("query")
            .expect("row");
        assert!(survivor.enriched_at.is_some());
    }

    #[tokio::test]
    async fn unresolvable_investor_fails_the_product_without_persisting() {
        let bad_payload = serde_json::json!({
            "description": "A smiley-faced scratch-free sponge",
            "deal_status": "funded",
            "investors": [
                {"name": "Lori Greiner", "is_lead": true},
                {"name": "???"},
            ],
        })
        .to_string();
        let generation = Arc::new(MockGeneration::new());
        generation.push_text(bad_payload);
        generation.push_text(product_payload());

        let (ctx, storage) = test_context(
            Arc::new(MockSearch::with_hits(hits())),
            generation,
            test_settings(),
        )
        .await;
        storage
            .upsert_product(&product("Scrub Daddy"))
            .await
            .expect("seed");

        let first = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("first run");
        assert_eq!(first.updated, 0);
        assert_eq!(first.failed.len(), 1);
        assert_eq!(first.failed[0].0, "Scrub Daddy");
        assert!(first.failed[0].1.contains("slug"));

        let untouched = storage
            .get_product_by_slug("scrub-daddy")
            .await
            .expect("query")
            .expect("row");
        assert!(untouched.enriched_at.is_none());
        assert!(untouched.deal_status.is_none());
        assert!(storage
            .list_product_investors(&untouched.id)
            .await
            .expect("links")
            .is_empty());

        // Nothing was marked enriched, so a plain re-run picks the
        // product up again and converges on the clean payload.
        let second = enrich_products(Arc::clone(&ctx), None, None, false, &SilentProgress)
            .await
            .expect("second run");
        assert_eq!(second.updated, 1);
        assert_eq!(second.cache_hits, 1);

        let links = storage
            .list_product_investors(&untouched.id)
            .await
            .expect("links");
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn investor_flow_composes_and_stores_the_bio() {
        let payload = serde_json::json!({
            "bio": "Inventor of 120 products and a QVC mainstay",
            "firm": "Lori Greiner Ventures",
            "focus_areas": ["consumer products", "retail"],
        })
        .to_string();
        let (ctx, storage) = test_context(
            Arc::new(MockSearch::with_hits(hits())),
            Arc::new(MockGeneration::with_text(payload)),
            test_settings(),
        )
        .await;
        storage
            .get_or_create_investor("Lori Greiner", "lori-greiner", false)
            .await
            .expect("seed");

        let summary = enrich_investors(Arc::clone(&ctx), None, false, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.usage.prompt_tokens, 120);
        assert!(summary.estimated_cost > 0.0);

        let stored = storage
            .get_investor_by_slug("lori-greiner")
            .await
            .expect("query")
            .expect("row");
        let bio = stored.bio.expect("bio set");
        assert!(bio.contains("Affiliated with Lori Greiner Ventures."));
        assert!(bio.contains("Typically invests in consumer products, retail."));
        assert!(stored.enriched_at.is_some());
    }

    #[tokio::test]
    async fn nothing_to_do_returns_an_empty_summary() {
        let (ctx, _storage) = test_context(
            Arc::new(MockSearch::new()),
            Arc::new(MockGeneration::new()),
            test_settings(),
        )
        .await;

        let summary = enrich_products(ctx, None, None, false, &SilentProgress)
            .await
            .expect("run");
        assert_eq!(summary.processed(), 0);
        assert_eq!(summary.usage.total(), 0);
    }
}
