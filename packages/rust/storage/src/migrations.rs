//! SQL migration definitions for the Dealboard database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description:
            "Initial schema: products, investors, deal links, aliases, search cache, run history",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Products pitched on the show
CREATE TABLE IF NOT EXISTS products (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    season      INTEGER,
    episode     INTEGER,
    description TEXT,
    category    TEXT,
    website     TEXT,
    ask_amount  REAL,
    ask_equity  REAL,
    deal_amount REAL,
    deal_equity REAL,
    deal_status TEXT,
    enriched_at TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_season ON products(season);
CREATE INDEX IF NOT EXISTS idx_products_enriched ON products(enriched_at);

-- Canonical investor records. The slug is the dedup key the resolver
-- relies on; concurrent auto-creation must collapse onto one row.
CREATE TABLE IF NOT EXISTS investors (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    slug            TEXT NOT NULL UNIQUE,
    bio             TEXT,
    is_auto_created INTEGER NOT NULL DEFAULT 0,
    enriched_at     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Deal participation links, replaced wholesale per enrichment run
CREATE TABLE IF NOT EXISTS product_investors (
    product_id     TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    investor_id    TEXT NOT NULL REFERENCES investors(id) ON DELETE CASCADE,
    amount         REAL,
    equity_percent REAL,
    is_lead        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (product_id, investor_id)
);

CREATE INDEX IF NOT EXISTS idx_product_investors_investor ON product_investors(investor_id);

-- Known name variants. `alias` is stored normalized (lowercased, trimmed);
-- `source` is 'curated' for hand-maintained rows, 'auto' for rows derived
-- during resolution.
CREATE TABLE IF NOT EXISTS investor_aliases (
    alias      TEXT PRIMARY KEY,
    slug       TEXT NOT NULL,
    source     TEXT NOT NULL DEFAULT 'curated',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_investor_aliases_slug ON investor_aliases(slug);

-- Search response cache, content-addressed by normalized query hash.
-- One live row per (entity_type, query_hash); re-fetches upsert in place.
CREATE TABLE IF NOT EXISTS search_cache (
    id           TEXT PRIMARY KEY,
    entity_type  TEXT NOT NULL,
    entity_id    TEXT,
    entity_name  TEXT,
    query        TEXT NOT NULL,
    query_hash   TEXT NOT NULL,
    results_json TEXT NOT NULL,
    fetched_at   TEXT NOT NULL,
    expires_at   TEXT,
    UNIQUE(entity_type, query_hash)
);

CREATE INDEX IF NOT EXISTS idx_search_cache_hash ON search_cache(query_hash);
CREATE INDEX IF NOT EXISTS idx_search_cache_expires ON search_cache(expires_at);

-- Enrichment run history
CREATE TABLE IF NOT EXISTS enrichment_runs (
    id          TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

-- Seed curated aliases for the regular sharks
INSERT OR IGNORE INTO investor_aliases (alias, slug, source) VALUES
    ('mr. wonderful', 'kevin-oleary', 'curated'),
    ('mr wonderful', 'kevin-oleary', 'curated'),
    ('kevin o''leary', 'kevin-oleary', 'curated'),
    ('kevin oleary', 'kevin-oleary', 'curated'),
    ('lori grenier', 'lori-greiner', 'curated'),
    ('robert herjavic', 'robert-herjavec', 'curated'),
    ('daymond garfield john', 'daymond-john', 'curated'),
    ('barbara ann corcoran', 'barbara-corcoran', 'curated');

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
