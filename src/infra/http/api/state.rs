use std::sync::Arc;

use crate::application::auth::TokenAuthenticator;
use crate::application::bookings::BookingService;
use crate::application::dashboard::DashboardService;
use crate::application::maintenance::MaintenanceService;
use crate::application::recurring::RecurringExpenseService;
use crate::application::repos::{BookingRepo, MaintenanceRepo, RecurringExpenseRepo, VehicleRepo};
use crate::application::vehicles::VehicleService;
use crate::cache::{CacheAside, CacheConfig, InvalidationRouter, TtlStore};
use crate::config::ApiToken;

#[derive(Clone)]
pub struct ApiState {
    pub vehicles: Arc<VehicleService>,
    pub bookings: Arc<BookingService>,
    pub dashboard: Arc<DashboardService>,
    pub recurring: Arc<RecurringExpenseService>,
    pub maintenance: Arc<MaintenanceService>,
    pub cache_store: Arc<TtlStore>,
    pub invalidation: Arc<InvalidationRouter>,
    pub auth: Arc<TokenAuthenticator>,
}

impl ApiState {
    /// Wire every service onto one repository backend and one shared store.
    pub fn build<R>(
        repos: Arc<R>,
        store: Arc<TtlStore>,
        cache_config: CacheConfig,
        maintenance_lead_days: u32,
        tokens: Vec<ApiToken>,
    ) -> Self
    where
        R: VehicleRepo + BookingRepo + RecurringExpenseRepo + MaintenanceRepo + 'static,
    {
        let vehicle_repo: Arc<dyn VehicleRepo> = repos.clone();
        let booking_repo: Arc<dyn BookingRepo> = repos.clone();
        let recurring_repo: Arc<dyn RecurringExpenseRepo> = repos.clone();
        let maintenance_repo: Arc<dyn MaintenanceRepo> = repos;

        let cache = Arc::new(CacheAside::new(cache_config, Arc::clone(&store)));
        let invalidation = Arc::new(InvalidationRouter::new(Arc::clone(&store)));

        Self {
            vehicles: Arc::new(VehicleService::new(
                vehicle_repo.clone(),
                cache.clone(),
                invalidation.clone(),
            )),
            bookings: Arc::new(BookingService::new(
                booking_repo.clone(),
                vehicle_repo.clone(),
                cache.clone(),
                invalidation.clone(),
            )),
            dashboard: Arc::new(DashboardService::new(
                vehicle_repo.clone(),
                booking_repo,
                recurring_repo.clone(),
                maintenance_repo.clone(),
                cache.clone(),
                maintenance_lead_days,
            )),
            recurring: Arc::new(RecurringExpenseService::new(
                recurring_repo,
                cache.clone(),
                invalidation.clone(),
            )),
            maintenance: Arc::new(MaintenanceService::new(
                maintenance_repo,
                vehicle_repo,
                cache,
                invalidation.clone(),
                maintenance_lead_days,
            )),
            cache_store: store,
            invalidation,
            auth: Arc::new(TokenAuthenticator::new(tokens)),
        }
    }
}
