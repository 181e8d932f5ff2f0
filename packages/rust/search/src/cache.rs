//! Content-addressed cache in front of the search provider.
//!
//! Queries are normalized and hashed; rows carry per-entity-type TTLs.
//! The cache never blocks the pipeline: read failures degrade to a miss
//! and write failures are logged and swallowed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use dealboard_shared::{CacheConfig, CachedSearchResult, EntityType, SearchHit, new_id};
use dealboard_storage::Storage;

/// Normalize a query for hashing (case-fold + trim).
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// SHA-256 hex of the normalized query.
pub fn query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read-through cache over the `search_cache` table.
pub struct QueryCache {
    storage: Arc<Storage>,
    config: CacheConfig,
}

impl QueryCache {
    pub fn new(storage: Arc<Storage>, config: CacheConfig) -> Self {
        Self { storage, config }
    }

    /// Look up a fresh cached response for a query.
    ///
    /// Returns `None` on a true miss, an expired row, or a storage read
    /// failure (the pipeline falls through to a live fetch in all cases).
    pub async fn get(&self, entity_type: EntityType, query: &str) -> Option<CachedSearchResult> {
        let hash = query_hash(query);

        match self.storage.get_search_cache(entity_type, &hash).await {
            Ok(Some(row)) => {
                let expired = row.expires_at.is_some_and(|t| t <= Utc::now());
                if expired {
                    debug!(entity_type = %entity_type, hash = %&hash[..12], "cache row expired");
                    None
                } else {
                    debug!(entity_type = %entity_type, hash = %&hash[..12], "cache hit");
                    Some(row)
                }
            }
            Ok(None) => {
                debug!(entity_type = %entity_type, hash = %&hash[..12], "cache miss");
                None
            }
            Err(e) => {
                warn!(error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a freshly fetched response.
    ///
    /// `ttl_days` overrides the per-entity-type default; 0 means the row
    /// never expires. Write failures are logged and swallowed so the
    /// caller still gets its results.
    pub async fn put(
        &self,
        entity_type: EntityType,
        entity_id: Option<&str>,
        entity_name: Option<&str>,
        query: &str,
        results: &[SearchHit],
        ttl_days: Option<u32>,
    ) {
        let ttl = ttl_days.unwrap_or_else(|| entity_type.ttl_days(&self.config));
        let expires_at = (ttl > 0).then(|| Utc::now() + Duration::days(i64::from(ttl)));

        let row = CachedSearchResult {
            id: new_id(),
            entity_type,
            entity_id: entity_id.map(str::to_string),
            entity_name: entity_name.map(str::to_string),
            query: query.to_string(),
            query_hash: query_hash(query),
            results: results.to_vec(),
            fetched_at: Utc::now(),
            expires_at,
        };

        if let Err(e) = self.storage.upsert_search_cache(&row).await {
            warn!(error = %e, "cache write failed, continuing without caching");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_cache() -> QueryCache {
        let tmp = std::env::temp_dir().join(format!("db_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        QueryCache::new(Arc::new(storage), CacheConfig::default())
    }

    fn hits() -> Vec<SearchHit> {
        vec![SearchHit {
            title: "Scrub Daddy update".into(),
            url: "https://example.com/a".into(),
            content: "Lori invested $200k for 20%.".into(),
            score: Some(0.9),
        }]
    }

    #[test]
    fn hash_is_deterministic_and_normalized() {
        let a = query_hash("Scrub Daddy shark tank deal");
        let b = query_hash("  scrub daddy SHARK TANK deal  ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let c = query_hash("a different query");
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn put_then_get_is_a_hit() {
        let cache = test_cache().await;

        assert!(cache.get(EntityType::Product, "Scrub Daddy deal").await.is_none());

        cache
            .put(
                EntityType::Product,
                None,
                Some("Scrub Daddy"),
                "Scrub Daddy deal",
                &hits(),
                None,
            )
            .await;

        // Case and whitespace variants hash to the same row
        let hit = cache
            .get(EntityType::Product, "  scrub daddy DEAL ")
            .await
            .expect("hit");
        assert_eq!(hit.results.len(), 1);
        assert_eq!(hit.entity_name.as_deref(), Some("Scrub Daddy"));
        assert!(hit.expires_at.is_some());
    }

    #[tokio::test]
    async fn entity_types_do_not_share_rows() {
        let cache = test_cache().await;
        cache
            .put(EntityType::Product, None, None, "kevin oleary", &hits(), None)
            .await;

        assert!(cache.get(EntityType::Investor, "kevin oleary").await.is_none());
        assert!(cache.get(EntityType::Product, "kevin oleary").await.is_some());
    }

    #[tokio::test]
    async fn expired_row_is_a_miss() {
        let tmp = std::env::temp_dir().join(format!("db_test_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open test db"));
        let cache = QueryCache::new(storage.clone(), CacheConfig::default());

        // Write a row that expired yesterday, bypassing the TTL computation
        let row = CachedSearchResult {
            id: new_id(),
            entity_type: EntityType::Product,
            entity_id: None,
            entity_name: None,
            query: "stale query".into(),
            query_hash: query_hash("stale query"),
            results: hits(),
            fetched_at: Utc::now() - Duration::days(31),
            expires_at: Some(Utc::now() - Duration::days(1)),
        };
        storage.upsert_search_cache(&row).await.expect("seed row");

        assert!(cache.get(EntityType::Product, "stale query").await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let cache = test_cache().await;
        cache
            .put(EntityType::Season, None, None, "season 4 air dates", &hits(), Some(0))
            .await;

        let hit = cache
            .get(EntityType::Season, "season 4 air dates")
            .await
            .expect("hit");
        assert!(hit.expires_at.is_none());
    }
}
