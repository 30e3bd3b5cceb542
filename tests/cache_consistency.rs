//! Cache-aside consistency across the store, the query wrapper and the
//! services that invalidate after writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::macros::{date, datetime};
use uuid::Uuid;

use fleetdesk::application::bookings::{BookingService, CreateBookingCommand};
use fleetdesk::application::dashboard::DashboardService;
use fleetdesk::application::repos::{
    CreateVehicleParams, ListPage, RepoError, UpdateVehicleParams, VehicleFilter, VehicleRepo,
};
use fleetdesk::application::vehicles::{CreateVehicleCommand, VehicleService};
use fleetdesk::cache::{
    CacheAside, CacheConfig, CacheKey, InvalidationRouter, KeyParams, ManualClock, Namespace, Tag,
    TtlStore, build_key,
};
use fleetdesk::domain::entities::VehicleRecord;
use fleetdesk::infra::memory::InMemoryRepositories;

/// Vehicle repository that counts listing reads.
struct CountingVehicles {
    inner: InMemoryRepositories,
    lists: AtomicUsize,
}

impl CountingVehicles {
    fn new(inner: InMemoryRepositories) -> Self {
        Self {
            inner,
            lists: AtomicUsize::new(0),
        }
    }

    fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VehicleRepo for CountingVehicles {
    async fn list_vehicles(
        &self,
        filter: &VehicleFilter,
    ) -> Result<ListPage<VehicleRecord>, RepoError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list_vehicles(filter).await
    }

    async fn find_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>, RepoError> {
        self.inner.find_vehicle(id).await
    }

    async fn create_vehicle(&self, params: CreateVehicleParams) -> Result<VehicleRecord, RepoError> {
        self.inner.create_vehicle(params).await
    }

    async fn update_vehicle(&self, params: UpdateVehicleParams) -> Result<VehicleRecord, RepoError> {
        self.inner.update_vehicle(params).await
    }

    async fn delete_vehicle(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete_vehicle(id).await
    }
}

fn cache_parts(max_entries: usize) -> (Arc<TtlStore>, Arc<CacheAside>, Arc<InvalidationRouter>) {
    let config = CacheConfig {
        max_entries,
        ..Default::default()
    };
    let store = Arc::new(TtlStore::new(&config));
    let cache = Arc::new(CacheAside::new(config, Arc::clone(&store)));
    let invalidation = Arc::new(InvalidationRouter::new(Arc::clone(&store)));
    (store, cache, invalidation)
}

fn corolla(plate: &str) -> CreateVehicleCommand {
    CreateVehicleCommand {
        plate: plate.to_string(),
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: 2022,
        daily_rate_cents: 4_500,
        mileage_km: 12_000,
    }
}

#[test]
fn keys_ignore_parameter_order() {
    let forward = build_key("x", &KeyParams::new().with("a", 1).with("b", 2));
    let reverse = build_key("x", &KeyParams::new().with("b", 2).with("a", 1));
    assert_eq!(forward, reverse);
    assert_eq!(build_key("vehicle", &KeyParams::new()).as_str(), "vehicle:{}");
}

#[test]
fn dashboard_entry_expires_after_its_ttl() {
    let clock = Arc::new(ManualClock::new(datetime!(2025-03-01 09:00 UTC)));
    let store = TtlStore::with_clock(&CacheConfig::default(), clock.clone());
    let key = CacheKey::from_raw("dashboard:u1");

    store.set(key.clone(), "summary".to_string(), Duration::from_secs(120));

    clock.advance(Duration::from_secs(119));
    assert_eq!(store.get_as::<String>(&key).as_deref(), Some("summary"));

    clock.advance(Duration::from_secs(2));
    assert_eq!(store.get_as::<String>(&key), None);
    assert_eq!(store.stats().size, 0);
}

#[test]
fn store_never_exceeds_capacity() {
    let (store, _, _) = cache_parts(5);
    for i in 0..50 {
        store.set(
            CacheKey::from_raw(format!("vehicle:id:{i}")),
            i,
            Duration::from_secs(60),
        );
        assert!(store.len() <= 5);
    }
    assert_eq!(store.stats().evictions, 45);
}

#[tokio::test]
async fn vehicle_listing_is_fetched_once_until_invalidated() {
    let (_, cache, invalidation) = cache_parts(100);
    let fetches = AtomicUsize::new(0);
    let key = build_key(Namespace::Vehicle.as_str(), &KeyParams::new());
    let ttl = Duration::from_secs(60);

    let fetch = || async {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok::<_, RepoError>(vec!["AB-123".to_string()])
    };

    for _ in 0..3 {
        let vehicles = cache
            .query_tagged(&key, ttl, [Tag::Namespace(Namespace::Vehicle)], fetch)
            .await
            .expect("fetch succeeds");
        assert_eq!(vehicles, vec!["AB-123".to_string()]);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    invalidation.invalidate_vehicle_cache(None);

    cache
        .query_tagged(&key, ttl, [Tag::Namespace(Namespace::Vehicle)], fetch)
        .await
        .expect("fetch succeeds");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn plain_vehicle_query_is_refetched_after_invalidation() {
    let (_, cache, invalidation) = cache_parts(100);
    let fetches = AtomicUsize::new(0);
    let key = CacheKey::from_raw("vehicles:{}");
    let ttl = Duration::from_secs(60);

    let fetch = || async {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok::<_, RepoError>(3usize)
    };

    for _ in 0..3 {
        cache.query(&key, ttl, fetch).await.expect("fetch succeeds");
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    assert_eq!(invalidation.invalidate_vehicle_cache(None), 1);

    cache.query(&key, ttl, fetch).await.expect("fetch succeeds");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_query() {
    let (store, cache, _) = cache_parts(100);
    let key = CacheKey::from_raw("financial:{}");
    let ttl = Duration::from_secs(180);

    let first: Result<u64, RepoError> = cache
        .query(&key, ttl, || async { Err(RepoError::Timeout) })
        .await;
    assert!(matches!(first, Err(RepoError::Timeout)));
    assert!(store.is_empty());

    let second = cache
        .query(&key, ttl, || async { Ok::<_, RepoError>(42u64) })
        .await
        .expect("second fetch succeeds");
    assert_eq!(second, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_fetch() {
    let (_, cache, _) = cache_parts(100);
    let fetches = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::from_raw("dashboard:user:\"u1\"");

    let calls = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        let fetches = Arc::clone(&fetches);
        let key = key.clone();
        tokio::spawn(async move {
            cache
                .query(&key, Duration::from_secs(120), || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, RepoError>(7u32)
                })
                .await
        })
    });

    for joined in futures::future::join_all(calls).await {
        assert_eq!(joined.expect("task completes").expect("fetch succeeds"), 7);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vehicle_writes_invalidate_cached_listings() {
    let (_, cache, invalidation) = cache_parts(100);
    let repo = Arc::new(CountingVehicles::new(InMemoryRepositories::new()));
    let service = VehicleService::new(repo.clone(), cache, invalidation);

    service.create(corolla("ab-100")).await.expect("created");
    let first = service.list(VehicleFilter::default()).await.expect("listed");
    let again = service.list(VehicleFilter::default()).await.expect("listed");
    assert_eq!(first.total, 1);
    assert_eq!(again, first);
    assert_eq!(repo.lists(), 1);

    service.create(corolla("ab-200")).await.expect("created");
    let after = service.list(VehicleFilter::default()).await.expect("listed");
    assert_eq!(after.total, 2);
    assert_eq!(repo.lists(), 2);
}

#[tokio::test]
async fn equivalent_filters_share_a_cache_entry() {
    let (_, cache, invalidation) = cache_parts(100);
    let repo = Arc::new(CountingVehicles::new(InMemoryRepositories::new()));
    let service = VehicleService::new(repo.clone(), cache, invalidation);

    for search in ["Corolla", "  corolla  "] {
        service
            .list(VehicleFilter {
                search: Some(search.to_string()),
                ..Default::default()
            })
            .await
            .expect("listed");
    }
    assert_eq!(repo.lists(), 1);
}

#[tokio::test]
async fn booking_changes_refresh_the_dashboard() {
    let (_, cache, invalidation) = cache_parts(100);
    let repos = Arc::new(InMemoryRepositories::new());
    let vehicles = VehicleService::new(repos.clone(), cache.clone(), invalidation.clone());
    let bookings = BookingService::new(
        repos.clone(),
        repos.clone(),
        cache.clone(),
        invalidation.clone(),
    );
    let dashboard = DashboardService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        cache,
        14,
    );
    let today = date!(2025 - 06 - 10);

    let vehicle = vehicles.create(corolla("fd-001")).await.expect("created");
    let before = dashboard.summary("u1", today).await.expect("summary");
    assert_eq!(before.open_bookings, 0);
    assert_eq!(before.fleet.total, 1);

    bookings
        .create(CreateBookingCommand {
            vehicle_id: vehicle.id,
            customer_id: Uuid::new_v4(),
            start_date: date!(2025 - 06 - 09),
            end_date: date!(2025 - 06 - 12),
        })
        .await
        .expect("booked");

    let after = dashboard.summary("u1", today).await.expect("summary");
    assert_eq!(after.open_bookings, 1);
    assert_eq!(after.bookings_on_date, 1);
}
