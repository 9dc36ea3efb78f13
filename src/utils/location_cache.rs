use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;
use sqlx::MySqlPool;

use crate::model::work_location::WorkLocation;

const ACTIVE_KEY: &str = "active";

pub const SELECT_LOCATIONS: &str = r#"
    SELECT id, name, latitude, longitude, radius_meters, is_active,
           location_type, address, created_at, updated_at
    FROM work_locations
"#;

/// Active work locations, read on every check-in/out.
/// Writes to `work_locations` must call [`LocationCache::invalidate`].
#[derive(Clone)]
pub struct LocationCache {
    inner: Cache<&'static str, Arc<Vec<WorkLocation>>>,
}

impl LocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn active_locations(
        &self,
        pool: &MySqlPool,
    ) -> Result<Arc<Vec<WorkLocation>>, Arc<sqlx::Error>> {
        self.get_or_load(load_active(pool)).await
    }

    async fn get_or_load<F>(&self, load: F) -> Result<Arc<Vec<WorkLocation>>, Arc<sqlx::Error>>
    where
        F: Future<Output = Result<Vec<WorkLocation>, sqlx::Error>>,
    {
        self.inner
            .try_get_with(ACTIVE_KEY, async move { load.await.map(Arc::new) })
            .await
    }

    pub async fn invalidate(&self) {
        self.inner.invalidate(&ACTIVE_KEY).await;
    }

    pub async fn warmup(&self, pool: &MySqlPool) -> Result<()> {
        let locations = self
            .active_locations(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load active work locations: {e}"))?;

        tracing::info!(
            "Location cache warmup complete: {} active work locations",
            locations.len()
        );
        Ok(())
    }
}

async fn load_active(pool: &MySqlPool) -> Result<Vec<WorkLocation>, sqlx::Error> {
    let sql = format!("{SELECT_LOCATIONS} WHERE is_active = TRUE ORDER BY id");
    sqlx::query_as::<_, WorkLocation>(&sql).fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::work_location::sample_location;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(
        calls: &AtomicUsize,
        locations: Vec<WorkLocation>,
    ) -> impl Future<Output = Result<Vec<WorkLocation>, sqlx::Error>> + '_ {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(locations)
        }
    }

    #[actix_web::test]
    async fn second_read_is_served_from_cache() {
        let cache = LocationCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let sites = vec![sample_location(1, "Main Clinic", -6.2, 106.816, 100.0)];

        let first = cache
            .get_or_load(counting_loader(&calls, sites.clone()))
            .await
            .unwrap();
        let second = cache
            .get_or_load(counting_loader(&calls, vec![]))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 1);
        assert_eq!(second[0].name, "Main Clinic");
    }

    #[actix_web::test]
    async fn invalidate_forces_reload() {
        let cache = LocationCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_load(counting_loader(&calls, vec![]))
            .await
            .unwrap();
        cache.invalidate().await;
        let reloaded = cache
            .get_or_load(counting_loader(
                &calls,
                vec![sample_location(2, "Branch", 0.0, 0.0, 50.0)],
            ))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(reloaded.len(), 1);
    }

    #[actix_web::test]
    async fn load_errors_are_not_cached() {
        let cache = LocationCache::new(Duration::from_secs(60));

        let failed = cache
            .get_or_load(async { Err(sqlx::Error::PoolTimedOut) })
            .await;
        assert!(failed.is_err());

        let ok = cache.get_or_load(async { Ok(vec![]) }).await;
        assert!(ok.is_ok());
    }
}
