//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding products, investors,
//! deal participation links, the investor alias table, the search cache, and
//! enrichment run history.
//!
//! **Access rules:**
//! - enrich/import/admin commands: read-write (sole writer) via [`Storage::open`]
//! - inspection commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use dealboard_shared::{
    CachedSearchResult, DealboardError, EntityType, Investor, Product, ProductInvestor, Result,
    new_id,
};
use libsql::{Connection, Database, params};

/// Column list shared by all product SELECTs; order matches [`row_to_product`].
const PRODUCT_COLS: &str = "id, name, slug, season, episode, description, category, website, \
     ask_amount, ask_equity, deal_amount, deal_equity, deal_status, enriched_at, \
     created_at, updated_at";

/// Column list shared by all investor SELECTs; order matches [`row_to_investor`].
const INVESTOR_COLS: &str =
    "id, name, slug, bio, is_auto_created, enriched_at, created_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DealboardError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DealboardError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DealboardError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Product operations
    // -----------------------------------------------------------------------

    /// Upsert a product by slug. Import-owned fields are overwritten;
    /// enrichment-owned fields (deal terms, enriched_at) are left alone
    /// so a re-import never clears completed enrichment.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO products (id, name, slug, season, episode, description, category,
                                       website, ask_amount, ask_equity, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(slug) DO UPDATE SET
                   name = excluded.name,
                   season = excluded.season,
                   episode = excluded.episode,
                   description = COALESCE(excluded.description, products.description),
                   category = COALESCE(excluded.category, products.category),
                   website = COALESCE(excluded.website, products.website),
                   ask_amount = COALESCE(excluded.ask_amount, products.ask_amount),
                   ask_equity = COALESCE(excluded.ask_equity, products.ask_equity),
                   updated_at = excluded.updated_at",
                params![
                    product.id.as_str(),
                    product.name.as_str(),
                    product.slug.as_str(),
                    product.season,
                    product.episode,
                    product.description.as_deref(),
                    product.category.as_deref(),
                    product.website.as_deref(),
                    product.ask_amount,
                    product.ask_equity,
                    product.created_at.to_rfc3339(),
                    product.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Write back a full product row after enrichment.
    pub async fn update_product(&self, product: &Product) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE products SET
                   name = ?1, slug = ?2, season = ?3, episode = ?4, description = ?5,
                   category = ?6, website = ?7, ask_amount = ?8, ask_equity = ?9,
                   deal_amount = ?10, deal_equity = ?11, deal_status = ?12,
                   enriched_at = ?13, updated_at = ?14
                 WHERE id = ?15",
                params![
                    product.name.as_str(),
                    product.slug.as_str(),
                    product.season,
                    product.episode,
                    product.description.as_deref(),
                    product.category.as_deref(),
                    product.website.as_deref(),
                    product.ask_amount,
                    product.ask_equity,
                    product.deal_amount,
                    product.deal_equity,
                    product.deal_status.as_deref(),
                    product.enriched_at.map(|t| t.to_rfc3339()),
                    product.updated_at.to_rfc3339(),
                    product.id.as_str(),
                ],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a product by slug.
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLS} FROM products WHERE slug = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![slug])
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_product(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DealboardError::Storage(e.to_string())),
        }
    }

    /// List products pending enrichment.
    ///
    /// `force` includes already-enriched rows; `season` filters to one
    /// season; `limit` caps the result (a negative SQL LIMIT means all).
    pub async fn list_products_for_enrichment(
        &self,
        force: bool,
        season: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLS} FROM products
             WHERE (?1 = 1 OR enriched_at IS NULL)
               AND (?2 < 0 OR season = ?2)
             ORDER BY season, episode, name
             LIMIT ?3"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![
                    i64::from(force),
                    season.unwrap_or(-1),
                    limit.map(i64::from).unwrap_or(-1),
                ],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_product(&row)?);
        }
        Ok(results)
    }

    /// Replace all investor links for a product (delete-then-insert).
    pub async fn replace_product_investors(
        &self,
        product_id: &str,
        links: &[ProductInvestor],
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM product_investors WHERE product_id = ?1",
                params![product_id],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        for link in links {
            self.conn
                .execute(
                    "INSERT INTO product_investors (product_id, investor_id, amount, equity_percent, is_lead)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(product_id, investor_id) DO UPDATE SET
                       amount = excluded.amount,
                       equity_percent = excluded.equity_percent,
                       is_lead = excluded.is_lead",
                    params![
                        link.product_id.as_str(),
                        link.investor_id.as_str(),
                        link.amount,
                        link.equity_percent,
                        i64::from(link.is_lead),
                    ],
                )
                .await
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// List investor links for a product.
    pub async fn list_product_investors(&self, product_id: &str) -> Result<Vec<ProductInvestor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT product_id, investor_id, amount, equity_percent, is_lead
                 FROM product_investors WHERE product_id = ?1",
                params![product_id],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ProductInvestor {
                product_id: row
                    .get::<String>(0)
                    .map_err(|e| DealboardError::Storage(e.to_string()))?,
                investor_id: row
                    .get::<String>(1)
                    .map_err(|e| DealboardError::Storage(e.to_string()))?,
                amount: row.get::<f64>(2).ok(),
                equity_percent: row.get::<f64>(3).ok(),
                is_lead: row.get::<i64>(4).unwrap_or(0) != 0,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Investor operations
    // -----------------------------------------------------------------------

    /// Get an investor by slug.
    pub async fn get_investor_by_slug(&self, slug: &str) -> Result<Option<Investor>> {
        let sql = format!("SELECT {INVESTOR_COLS} FROM investors WHERE slug = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![slug])
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_investor(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DealboardError::Storage(e.to_string())),
        }
    }

    /// List all investors, ordered by name.
    pub async fn list_investors(&self) -> Result<Vec<Investor>> {
        let sql = format!("SELECT {INVESTOR_COLS} FROM investors ORDER BY name");
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_investor(&row)?);
        }
        Ok(results)
    }

    /// List investors pending enrichment (see [`Self::list_products_for_enrichment`]).
    pub async fn list_investors_for_enrichment(
        &self,
        force: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Investor>> {
        let sql = format!(
            "SELECT {INVESTOR_COLS} FROM investors
             WHERE (?1 = 1 OR enriched_at IS NULL)
             ORDER BY name
             LIMIT ?2"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![i64::from(force), limit.map(i64::from).unwrap_or(-1)],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_investor(&row)?);
        }
        Ok(results)
    }

    /// Get an existing investor by slug, or create one.
    ///
    /// Creation tolerates a concurrent writer winning the insert: the
    /// UNIQUE(slug) conflict is ignored and the canonical row read back.
    pub async fn get_or_create_investor(
        &self,
        name: &str,
        slug: &str,
        is_auto_created: bool,
    ) -> Result<Investor> {
        if let Some(existing) = self.get_investor_by_slug(slug).await? {
            return Ok(existing);
        }

        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO investors (id, name, slug, is_auto_created, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(slug) DO NOTHING",
                params![
                    new_id().as_str(),
                    name,
                    slug,
                    i64::from(is_auto_created),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        self.get_investor_by_slug(slug)
            .await?
            .ok_or_else(|| DealboardError::Storage(format!("investor row missing for slug {slug}")))
    }

    /// Write back a full investor row after enrichment.
    pub async fn update_investor(&self, investor: &Investor) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE investors SET
                   name = ?1, slug = ?2, bio = ?3, is_auto_created = ?4,
                   enriched_at = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    investor.name.as_str(),
                    investor.slug.as_str(),
                    investor.bio.as_deref(),
                    i64::from(investor.is_auto_created),
                    investor.enriched_at.map(|t| t.to_rfc3339()),
                    investor.updated_at.to_rfc3339(),
                    investor.id.as_str(),
                ],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Alias operations
    // -----------------------------------------------------------------------

    /// List all alias rows.
    pub async fn list_aliases(&self) -> Result<Vec<InvestorAlias>> {
        let mut rows = self
            .conn
            .query(
                "SELECT alias, slug, source FROM investor_aliases ORDER BY slug, alias",
                params![],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(InvestorAlias {
                alias: row
                    .get::<String>(0)
                    .map_err(|e| DealboardError::Storage(e.to_string()))?,
                slug: row
                    .get::<String>(1)
                    .map_err(|e| DealboardError::Storage(e.to_string()))?,
                source: row
                    .get::<String>(2)
                    .map_err(|e| DealboardError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }

    /// Insert or update an alias mapping. `alias` must already be normalized.
    pub async fn upsert_alias(&self, alias: &str, slug: &str, source: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO investor_aliases (alias, slug, source)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(alias) DO UPDATE SET
                   slug = excluded.slug,
                   source = excluded.source",
                params![alias, slug, source],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Search cache operations
    // -----------------------------------------------------------------------

    /// Get the most recently fetched cache row for a query hash, expired or
    /// not. Expiry policy lives with the cache layer, not here.
    pub async fn get_search_cache(
        &self,
        entity_type: EntityType,
        query_hash: &str,
    ) -> Result<Option<CachedSearchResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, entity_type, entity_id, entity_name, query, query_hash,
                        results_json, fetched_at, expires_at
                 FROM search_cache
                 WHERE entity_type = ?1 AND query_hash = ?2
                 ORDER BY fetched_at DESC
                 LIMIT 1",
                params![entity_type.as_str(), query_hash],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_cached_result(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DealboardError::Storage(e.to_string())),
        }
    }

    /// Store a search response, converging concurrent writers onto one row
    /// per `(entity_type, query_hash)`.
    pub async fn upsert_search_cache(&self, cached: &CachedSearchResult) -> Result<()> {
        self.check_writable()?;
        let results_json = serde_json::to_string(&cached.results)
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO search_cache (id, entity_type, entity_id, entity_name, query,
                                           query_hash, results_json, fetched_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(entity_type, query_hash) DO UPDATE SET
                   entity_id = excluded.entity_id,
                   entity_name = excluded.entity_name,
                   query = excluded.query,
                   results_json = excluded.results_json,
                   fetched_at = excluded.fetched_at,
                   expires_at = excluded.expires_at",
                params![
                    cached.id.as_str(),
                    cached.entity_type.as_str(),
                    cached.entity_id.as_deref(),
                    cached.entity_name.as_deref(),
                    cached.query.as_str(),
                    cached.query_hash.as_str(),
                    results_json.as_str(),
                    cached.fetched_at.to_rfc3339(),
                    cached.expires_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Per-entity-type cache counters as of `now`.
    pub async fn cache_stats(&self, now: DateTime<Utc>) -> Result<Vec<CacheStat>> {
        let now = now.to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "SELECT entity_type,
                        COUNT(*),
                        SUM(CASE WHEN expires_at IS NOT NULL AND expires_at <= ?1 THEN 1 ELSE 0 END)
                 FROM search_cache
                 GROUP BY entity_type
                 ORDER BY entity_type",
                params![now.as_str()],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let entity_type: String = row
                .get(0)
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
            let total: u64 = row.get::<u64>(1).unwrap_or(0);
            let expired: u64 = row.get::<u64>(2).unwrap_or(0);
            results.push(CacheStat {
                entity_type,
                total,
                live: total - expired,
                expired,
            });
        }
        Ok(results)
    }

    /// Delete expired cache rows. Returns the number of rows removed.
    pub async fn prune_search_cache(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        let now = now.to_rfc3339();
        let removed = self
            .conn
            .execute(
                "DELETE FROM search_cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now.as_str()],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Enrichment run operations
    // -----------------------------------------------------------------------

    /// Insert a new enrichment run. Returns the generated run ID.
    pub async fn insert_enrichment_run(&self, entity_type: EntityType) -> Result<String> {
        self.check_writable()?;
        let id = new_id();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO enrichment_runs (id, entity_type, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), entity_type.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Update an enrichment run with completion data.
    pub async fn finish_enrichment_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE enrichment_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| DealboardError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// One alias row from the `investor_aliases` table.
#[derive(Debug, Clone)]
pub struct InvestorAlias {
    /// Normalized name variant.
    pub alias: String,
    /// Canonical investor slug the variant maps to.
    pub slug: String,
    /// 'curated' or 'auto'.
    pub source: String,
}

/// Per-entity-type cache counters.
#[derive(Debug, Clone)]
pub struct CacheStat {
    pub entity_type: String,
    pub total: u64,
    pub live: u64,
    pub expired: u64,
}

/// Parse an RFC 3339 timestamp column.
fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DealboardError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Product`].
fn row_to_product(row: &libsql::Row) -> Result<Product> {
    Ok(Product {
        id: row
            .get::<String>(0)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        name: row
            .get::<String>(1)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        slug: row
            .get::<String>(2)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        season: row.get::<i64>(3).ok(),
        episode: row.get::<i64>(4).ok(),
        description: row.get::<String>(5).ok(),
        category: row.get::<String>(6).ok(),
        website: row.get::<String>(7).ok(),
        ask_amount: row.get::<f64>(8).ok(),
        ask_equity: row.get::<f64>(9).ok(),
        deal_amount: row.get::<f64>(10).ok(),
        deal_equity: row.get::<f64>(11).ok(),
        deal_status: row.get::<String>(12).ok(),
        enriched_at: match row.get::<String>(13).ok() {
            Some(s) => Some(parse_ts(&s)?),
            None => None,
        },
        created_at: {
            let s: String = row
                .get(14)
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
            parse_ts(&s)?
        },
        updated_at: {
            let s: String = row
                .get(15)
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
            parse_ts(&s)?
        },
    })
}

/// Convert a database row to an [`Investor`].
fn row_to_investor(row: &libsql::Row) -> Result<Investor> {
    Ok(Investor {
        id: row
            .get::<String>(0)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        name: row
            .get::<String>(1)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        slug: row
            .get::<String>(2)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        bio: row.get::<String>(3).ok(),
        is_auto_created: row.get::<i64>(4).unwrap_or(0) != 0,
        enriched_at: match row.get::<String>(5).ok() {
            Some(s) => Some(parse_ts(&s)?),
            None => None,
        },
        created_at: {
            let s: String = row
                .get(6)
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
            parse_ts(&s)?
        },
        updated_at: {
            let s: String = row
                .get(7)
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
            parse_ts(&s)?
        },
    })
}

/// Convert a database row to a [`CachedSearchResult`].
fn row_to_cached_result(row: &libsql::Row) -> Result<CachedSearchResult> {
    let entity_type: String = row
        .get(1)
        .map_err(|e| DealboardError::Storage(e.to_string()))?;
    let results_json: String = row
        .get(6)
        .map_err(|e| DealboardError::Storage(e.to_string()))?;

    Ok(CachedSearchResult {
        id: row
            .get::<String>(0)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        entity_type: entity_type.parse().map_err(DealboardError::Storage)?,
        entity_id: row.get::<String>(2).ok(),
        entity_name: row.get::<String>(3).ok(),
        query: row
            .get::<String>(4)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        query_hash: row
            .get::<String>(5)
            .map_err(|e| DealboardError::Storage(e.to_string()))?,
        results: serde_json::from_str(&results_json)
            .map_err(|e| DealboardError::Storage(format!("corrupt results_json: {e}")))?,
        fetched_at: {
            let s: String = row
                .get(7)
                .map_err(|e| DealboardError::Storage(e.to_string()))?;
            parse_ts(&s)?
        },
        expires_at: match row.get::<String>(8).ok() {
            Some(s) => Some(parse_ts(&s)?),
            None => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dealboard_shared::SearchHit;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("db_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn test_product(name: &str, slug: &str, season: Option<i64>) -> Product {
        Product {
            id: new_id(),
            name: name.into(),
            slug: slug.into(),
            season,
            episode: Some(1),
            description: None,
            category: None,
            website: None,
            ask_amount: Some(200_000.0),
            ask_equity: Some(10.0),
            deal_amount: None,
            deal_equity: None,
            deal_status: None,
            enriched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_cached(entity_type: EntityType, hash: &str, expires_at: Option<DateTime<Utc>>) -> CachedSearchResult {
        CachedSearchResult {
            id: new_id(),
            entity_type,
            entity_id: None,
            entity_name: Some("Scrub Daddy".into()),
            query: "scrub daddy shark tank deal".into(),
            query_hash: hash.into(),
            results: vec![SearchHit {
                title: "Scrub Daddy update".into(),
                url: "https://example.com/a".into(),
                content: "Lori invested.".into(),
                score: Some(0.9),
            }],
            fetched_at: Utc::now(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("db_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn product_upsert_and_get() {
        let storage = test_storage().await;
        let product = test_product("Scrub Daddy", "scrub-daddy", Some(4));

        storage.upsert_product(&product).await.expect("insert");

        let found = storage
            .get_product_by_slug("scrub-daddy")
            .await
            .expect("get")
            .expect("some");
        assert_eq!(found.name, "Scrub Daddy");
        assert_eq!(found.season, Some(4));
        assert_eq!(found.ask_amount, Some(200_000.0));

        // Re-import with a new season keeps the original id
        let reimport = Product {
            season: Some(5),
            ..test_product("Scrub Daddy", "scrub-daddy", Some(5))
        };
        storage.upsert_product(&reimport).await.expect("upsert");
        let found = storage
            .get_product_by_slug("scrub-daddy")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, product.id);
        assert_eq!(found.season, Some(5));
    }

    #[tokio::test]
    async fn enrichment_listing_filters() {
        let storage = test_storage().await;
        storage
            .upsert_product(&test_product("A", "a", Some(1)))
            .await
            .unwrap();
        storage
            .upsert_product(&test_product("B", "b", Some(2)))
            .await
            .unwrap();

        // Mark A enriched
        let mut a = storage.get_product_by_slug("a").await.unwrap().unwrap();
        a.enriched_at = Some(Utc::now());
        a.deal_status = Some("funded".into());
        storage.update_product(&a).await.unwrap();

        let pending = storage
            .list_products_for_enrichment(false, None, None)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].slug, "b");

        let forced = storage
            .list_products_for_enrichment(true, None, None)
            .await
            .unwrap();
        assert_eq!(forced.len(), 2);

        let season1 = storage
            .list_products_for_enrichment(true, Some(1), None)
            .await
            .unwrap();
        assert_eq!(season1.len(), 1);
        assert_eq!(season1[0].slug, "a");

        let limited = storage
            .list_products_for_enrichment(true, None, Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn investor_get_or_create() {
        let storage = test_storage().await;

        let first = storage
            .get_or_create_investor("Kevin O'Leary", "kevin-oleary", true)
            .await
            .expect("create");
        assert!(first.is_auto_created);

        let second = storage
            .get_or_create_investor("Kevin O'Leary", "kevin-oleary", true)
            .await
            .expect("get");
        assert_eq!(first.id, second.id);

        let all = storage.list_investors().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn product_investor_links_replace() {
        let storage = test_storage().await;
        let product = test_product("Bubble Bee", "bubble-bee", Some(2));
        storage.upsert_product(&product).await.unwrap();

        let lori = storage
            .get_or_create_investor("Lori Greiner", "lori-greiner", false)
            .await
            .unwrap();
        let kevin = storage
            .get_or_create_investor("Kevin O'Leary", "kevin-oleary", false)
            .await
            .unwrap();

        storage
            .replace_product_investors(
                &product.id,
                &[
                    ProductInvestor {
                        product_id: product.id.clone(),
                        investor_id: lori.id.clone(),
                        amount: Some(100_000.0),
                        equity_percent: Some(10.0),
                        is_lead: true,
                    },
                    ProductInvestor {
                        product_id: product.id.clone(),
                        investor_id: kevin.id.clone(),
                        amount: Some(100_000.0),
                        equity_percent: Some(10.0),
                        is_lead: false,
                    },
                ],
            )
            .await
            .expect("first write");
        assert_eq!(
            storage.list_product_investors(&product.id).await.unwrap().len(),
            2
        );

        // A re-run replaces the set wholesale
        storage
            .replace_product_investors(
                &product.id,
                &[ProductInvestor {
                    product_id: product.id.clone(),
                    investor_id: lori.id.clone(),
                    amount: Some(200_000.0),
                    equity_percent: Some(15.0),
                    is_lead: true,
                }],
            )
            .await
            .expect("replace");
        let links = storage.list_product_investors(&product.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].amount, Some(200_000.0));
    }

    #[tokio::test]
    async fn seeded_aliases_present() {
        let storage = test_storage().await;
        let aliases = storage.list_aliases().await.expect("list");
        assert!(
            aliases
                .iter()
                .any(|a| a.alias == "mr. wonderful" && a.slug == "kevin-oleary")
        );
        assert!(aliases.iter().all(|a| a.source == "curated"));

        storage
            .upsert_alias("the sharkette", "barbara-corcoran", "curated")
            .await
            .expect("upsert alias");
        let aliases = storage.list_aliases().await.unwrap();
        assert!(aliases.iter().any(|a| a.alias == "the sharkette"));
    }

    #[tokio::test]
    async fn search_cache_upsert_converges() {
        let storage = test_storage().await;
        let hash = "a1".repeat(32);

        let miss = storage
            .get_search_cache(EntityType::Product, &hash)
            .await
            .expect("miss query");
        assert!(miss.is_none());

        storage
            .upsert_search_cache(&test_cached(
                EntityType::Product,
                &hash,
                Some(Utc::now() + Duration::days(30)),
            ))
            .await
            .expect("first write");
        storage
            .upsert_search_cache(&test_cached(
                EntityType::Product,
                &hash,
                Some(Utc::now() + Duration::days(30)),
            ))
            .await
            .expect("second write");

        let stats = storage.cache_stats(Utc::now()).await.expect("stats");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total, 1);

        let hit = storage
            .get_search_cache(EntityType::Product, &hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.results.len(), 1);
        assert_eq!(hit.results[0].title, "Scrub Daddy update");
    }

    #[tokio::test]
    async fn cache_stats_and_prune() {
        let storage = test_storage().await;
        storage
            .upsert_search_cache(&test_cached(
                EntityType::Product,
                &"b2".repeat(32),
                Some(Utc::now() - Duration::days(1)),
            ))
            .await
            .unwrap();
        storage
            .upsert_search_cache(&test_cached(
                EntityType::Investor,
                &"c3".repeat(32),
                Some(Utc::now() + Duration::days(90)),
            ))
            .await
            .unwrap();

        let stats = storage.cache_stats(Utc::now()).await.unwrap();
        let product = stats.iter().find(|s| s.entity_type == "product").unwrap();
        assert_eq!(product.expired, 1);
        assert_eq!(product.live, 0);
        let investor = stats.iter().find(|s| s.entity_type == "investor").unwrap();
        assert_eq!(investor.live, 1);

        let removed = storage.prune_search_cache(Utc::now()).await.expect("prune");
        assert_eq!(removed, 1);
        let stats = storage.cache_stats(Utc::now()).await.unwrap();
        assert!(stats.iter().all(|s| s.expired == 0));
    }

    #[tokio::test]
    async fn enrichment_run_lifecycle() {
        let storage = test_storage().await;
        let run_id = storage
            .insert_enrichment_run(EntityType::Product)
            .await
            .expect("insert run");
        assert!(!run_id.is_empty());

        storage
            .finish_enrichment_run(&run_id, r#"{"updated": 10}"#)
            .await
            .expect("finish run");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("db_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_product(&test_product("A", "a", None))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro.upsert_product(&test_product("B", "b", None)).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
