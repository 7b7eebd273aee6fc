// Metadata Providers - review-score / game-info enrichment seam
//
// The server talks to providers through these traits so implementations can
// be swapped at composition time. Outbound HTTP wrappers for the remote
// catalog services are deliberately not part of this crate; the shipped
// implementations serve payloads previously cached in SQLite.

use anyhow::Result;
use log::debug;
use rusqlite::Connection;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::db;

/// Review-score lookups (MetaCritic-style service).
pub trait ReviewScoreProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Score payload for a title, or `None` when the provider knows nothing.
    fn review_score(&self, title: &str) -> Result<Option<Value>>;
}

/// Catalog-info lookups (IGDB-style service).
pub trait GameInfoProvider: Send + Sync {
    fn name(&self) -> &str;

    fn game_info(&self, title: &str) -> Result<Option<Value>>;
}

/// Score provider backed by the `provider_cache` table.
pub struct CachedScoreProvider {
    db: Arc<Mutex<Connection>>,
}

impl CachedScoreProvider {
    pub const NAME: &'static str = "metacritic";

    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl ReviewScoreProvider for CachedScoreProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn review_score(&self, title: &str) -> Result<Option<Value>> {
        let conn = self.db.lock().unwrap();
        let hit = db::cache_get(&conn, Self::NAME, title)?;
        debug!("score lookup for {title}: cache {}", if hit.is_some() { "hit" } else { "miss" });
        Ok(hit)
    }
}

/// Game-info provider backed by the `provider_cache` table.
pub struct CachedInfoProvider {
    db: Arc<Mutex<Connection>>,
}

impl CachedInfoProvider {
    pub const NAME: &'static str = "igdb";

    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl GameInfoProvider for CachedInfoProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn game_info(&self, title: &str) -> Result<Option<Value>> {
        let conn = self.db.lock().unwrap();
        let hit = db::cache_get(&conn, Self::NAME, title)?;
        debug!("info lookup for {title}: cache {}", if hit.is_some() { "hit" } else { "miss" });
        Ok(hit)
    }
}

/// One place holding the provider services the server composes against.
pub struct ProviderRegistry {
    pub scores: Arc<dyn ReviewScoreProvider>,
    pub info: Arc<dyn GameInfoProvider>,
}

impl ProviderRegistry {
    /// Wire both providers to the shared database cache.
    pub fn with_cache(db: Arc<Mutex<Connection>>) -> Self {
        Self {
            scores: Arc::new(CachedScoreProvider::new(Arc::clone(&db))),
            info: Arc::new(CachedInfoProvider::new(db)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with_cache() -> (ProviderRegistry, Arc<Mutex<Connection>>) {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let db = Arc::new(Mutex::new(conn));
        (ProviderRegistry::with_cache(Arc::clone(&db)), db)
    }

    #[test]
    fn test_score_provider_serves_cached_payload() {
        let (registry, db) = registry_with_cache();

        assert!(registry.scores.review_score("Okami").unwrap().is_none());

        {
            let conn = db.lock().unwrap();
            db::cache_put(&conn, "metacritic", "Okami", &json!({ "score": 93 })).unwrap();
        }

        let hit = registry.scores.review_score("Okami").unwrap().unwrap();
        assert_eq!(hit["score"], 93);
    }

    #[test]
    fn test_info_provider_uses_its_own_namespace() {
        let (registry, db) = registry_with_cache();

        {
            let conn = db.lock().unwrap();
            db::cache_put(&conn, "metacritic", "Okami", &json!({ "score": 93 })).unwrap();
        }

        // Cached under the score provider, invisible to the info provider.
        assert!(registry.info.game_info("Okami").unwrap().is_none());

        {
            let conn = db.lock().unwrap();
            db::cache_put(&conn, "igdb", "Okami", &json!({ "genre": "Action" })).unwrap();
        }
        let hit = registry.info.game_info("Okami").unwrap().unwrap();
        assert_eq!(hit["genre"], "Action");
    }

    #[test]
    fn test_provider_names() {
        let (registry, _db) = registry_with_cache();
        assert_eq!(registry.scores.name(), "metacritic");
        assert_eq!(registry.info.name(), "igdb");
    }
}
