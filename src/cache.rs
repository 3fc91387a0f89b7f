//! Best-effort response cache in front of the database.
//!
//! Read handlers ask for a stored body before touching the database and store
//! the body they produced afterwards; write handlers delete every key matching
//! a glob pattern scoped to the resource they changed. Any backend failure is
//! logged and swallowed: requests fall through to the database and the cache
//! is never a source of request failure.

use std::time::Duration;

use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Expiry for collection bodies (property list/search, favorites list/check).
pub const COLLECTION_TTL_SECS: u64 = 60;
/// Expiry for single-resource lookups.
pub const RESOURCE_TTL_SECS: u64 = 300;

#[derive(Clone)]
pub struct Cache {
    conn: Option<ConnectionManager>,
}

impl Cache {
    /// Connect to the cache backend. A failure here disables caching for the
    /// process lifetime rather than failing startup.
    pub async fn connect(redis_url: &str) -> Self {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500))
            .set_response_timeout(Duration::from_millis(500));

        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "invalid redis url, caching disabled");
                return Self::disabled();
            }
        };

        match client.get_connection_manager_with_config(config).await {
            Ok(conn) => {
                debug!("cache connected");
                Self { conn: Some(conn) }
            }
            Err(e) => {
                warn!(error = %e, "redis unavailable, caching disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Look up a previously stored response body.
    pub async fn get_json(&self, key: &str) -> Option<Value> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "dropping unparseable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Store a response body under `key` with the given expiry. Bodies that
    /// opt out via `"noCache": true` are skipped.
    pub async fn put_json(&self, key: &str, value: &Value, ttl_secs: u64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if !should_cache(value) {
            return;
        }
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize response for cache");
                return;
            }
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            warn!(key, error = %e, "cache store failed");
        }
    }

    /// Delete every key matching a glob pattern (SCAN + DEL).
    pub async fn invalidate(&self, pattern: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        let mut cursor: u64 = 0;
        let mut keys: Vec<String> = Vec::new();
        loop {
            let reply: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;
            match reply {
                Ok((next, batch)) => {
                    keys.extend(batch);
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Err(e) => {
                    warn!(pattern, error = %e, "cache invalidation scan failed");
                    return;
                }
            }
        }

        if keys.is_empty() {
            return;
        }
        match conn.del::<_, ()>(keys).await {
            Ok(()) => debug!(pattern, "cache invalidated"),
            Err(e) => warn!(pattern, error = %e, "cache invalidation delete failed"),
        }
    }
}

/// Cache key for a read request: `api:` + path, plus the query string when
/// one is present.
pub fn request_key(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("api:{path}?{q}"),
        _ => format!("api:{path}"),
    }
}

/// Annotate a cache hit so clients can tell it apart from a fresh body.
pub fn mark_cached(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.insert("source".to_string(), Value::String("cache".to_string()));
    }
    value
}

fn should_cache(value: &Value) -> bool {
    value.get("noCache").and_then(Value::as_bool) != Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_key_includes_query_string_exactly() {
        assert_eq!(
            request_key("/api/properties", Some("minPrice=100&maxPrice=200")),
            "api:/api/properties?minPrice=100&maxPrice=200"
        );
        assert_eq!(request_key("/api/properties", None), "api:/api/properties");
        assert_eq!(
            request_key("/api/properties/PROP1001", Some("")),
            "api:/api/properties/PROP1001"
        );
    }

    #[test]
    fn cache_hits_are_marked() {
        let marked = mark_cached(json!({ "items": [], "total": 0 }));
        assert_eq!(marked["source"], "cache");
        assert_eq!(marked["total"], 0);
    }

    #[test]
    fn no_cache_marker_opts_out() {
        assert!(!should_cache(&json!({ "noCache": true })));
        assert!(should_cache(&json!({ "noCache": false })));
        assert!(should_cache(&json!({ "items": [] })));
    }

    #[tokio::test]
    async fn disabled_cache_is_a_no_op() {
        let cache = Cache::disabled();
        assert!(cache.get_json("api:/api/properties").await.is_none());
        cache
            .put_json("api:/api/properties", &json!({}), COLLECTION_TTL_SECS)
            .await;
        cache.invalidate("api:/api/properties*").await;
    }
}
