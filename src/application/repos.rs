//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use crate::domain::entities::{
    BookingRecord, ExpenseRecord, MaintenancePlanRecord, RecurringExpenseRecord, VehicleRecord,
};
use crate::domain::maintenance::MaintenancePlan;
use crate::domain::recurrence::RecurringSchedule;
use crate::domain::types::{BookingStatus, VehicleStatus};

pub const DEFAULT_PER_PAGE: u32 = 25;
pub const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

impl<T> ListPage<T> {
    /// Slice an already filtered, ordered collection.
    pub fn paginate(all: Vec<T>, page: Option<u32>, per_page: Option<u32>) -> Self {
        let (page, per_page) = effective_page(page, per_page);
        let total = all.len();
        let skip = (page as usize - 1).saturating_mul(per_page as usize);
        let items = all
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect();
        Self {
            items,
            total,
            page,
            per_page,
        }
    }
}

/// Page number and size a listing actually uses for the requested values.
pub fn effective_page(page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    (
        page.unwrap_or(1).max(1),
        per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
    )
}

// Filters double as cache key parameters, so every field that changes the
// result must be serialized, and equivalent requests must serialize the same.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleFilter {
    pub status: Option<VehicleStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl VehicleFilter {
    /// Trimmed, lower-cased search and explicit paging.
    pub fn normalized(mut self) -> Self {
        self.search = self.search.and_then(|search| {
            let trimmed = search.trim().to_lowercase();
            (!trimmed.is_empty()).then_some(trimmed)
        });
        let (page, per_page) = effective_page(self.page, self.per_page);
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub vehicle_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl BookingFilter {
    pub fn normalized(mut self) -> Self {
        let (page, per_page) = effective_page(self.page, self.per_page);
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurringExpenseFilter {
    pub vehicle_id: Option<Uuid>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateVehicleParams {
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub daily_rate_cents: i64,
    pub mileage_km: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateVehicleParams {
    pub id: Uuid,
    pub status: Option<VehicleStatus>,
    pub daily_rate_cents: Option<i64>,
    pub mileage_km: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CreateBookingParams {
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
}

#[derive(Debug, Clone)]
pub struct CreateRecurringExpenseParams {
    pub vehicle_id: Option<Uuid>,
    pub description: String,
    pub amount_cents: i64,
    pub schedule: RecurringSchedule,
}

#[derive(Debug, Clone)]
pub struct CreateExpenseParams {
    pub recurring_expense_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: Date,
}

#[derive(Debug, Clone)]
pub struct CreateMaintenancePlanParams {
    pub vehicle_id: Uuid,
    pub title: String,
    pub plan: MaintenancePlan,
}

#[async_trait]
pub trait VehicleRepo: Send + Sync {
    async fn list_vehicles(&self, filter: &VehicleFilter)
    -> Result<ListPage<VehicleRecord>, RepoError>;

    async fn find_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>, RepoError>;

    async fn create_vehicle(&self, params: CreateVehicleParams) -> Result<VehicleRecord, RepoError>;

    async fn update_vehicle(&self, params: UpdateVehicleParams) -> Result<VehicleRecord, RepoError>;

    async fn delete_vehicle(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait BookingRepo: Send + Sync {
    async fn list_bookings(&self, filter: &BookingFilter)
    -> Result<ListPage<BookingRecord>, RepoError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, RepoError>;

    /// Insert a booking. Fails with `RepoError::Duplicate` when an open
    /// booking on the same vehicle overlaps the requested dates.
    async fn create_booking(&self, params: CreateBookingParams) -> Result<BookingRecord, RepoError>;

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<BookingRecord, RepoError>;

    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait RecurringExpenseRepo: Send + Sync {
    async fn list_recurring_expenses(
        &self,
        filter: &RecurringExpenseFilter,
    ) -> Result<Vec<RecurringExpenseRecord>, RepoError>;

    async fn create_recurring_expense(
        &self,
        params: CreateRecurringExpenseParams,
    ) -> Result<RecurringExpenseRecord, RepoError>;

    async fn update_schedule(
        &self,
        id: Uuid,
        schedule: RecurringSchedule,
    ) -> Result<RecurringExpenseRecord, RepoError>;

    async fn create_expense(&self, params: CreateExpenseParams) -> Result<ExpenseRecord, RepoError>;

    async fn list_expenses(&self, from: Date, to: Date) -> Result<Vec<ExpenseRecord>, RepoError>;
}

#[async_trait]
pub trait MaintenanceRepo: Send + Sync {
    async fn list_plans(&self) -> Result<Vec<MaintenancePlanRecord>, RepoError>;

    async fn find_plan(&self, id: Uuid) -> Result<Option<MaintenancePlanRecord>, RepoError>;

    async fn create_plan(
        &self,
        params: CreateMaintenancePlanParams,
    ) -> Result<MaintenancePlanRecord, RepoError>;

    async fn update_plan(
        &self,
        id: Uuid,
        plan: MaintenancePlan,
    ) -> Result<MaintenancePlanRecord, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{KeyParams, build_key};

    #[test]
    fn paginate_defaults_to_first_page() {
        let page = ListPage::paginate((0..30).collect::<Vec<i32>>(), None, None);
        assert_eq!(page.items.len(), DEFAULT_PER_PAGE as usize);
        assert_eq!(page.total, 30);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn equivalent_paging_shares_one_cache_key() {
        let key = |filter: BookingFilter| {
            let params = KeyParams::from_serializable(&filter.normalized()).expect("serializable");
            build_key("booking", &params)
        };
        let omitted = key(BookingFilter::default());
        let first = key(BookingFilter {
            page: Some(1),
            ..Default::default()
        });
        let zero = key(BookingFilter {
            page: Some(0),
            per_page: Some(DEFAULT_PER_PAGE),
            ..Default::default()
        });

        assert_eq!(omitted, first);
        assert_eq!(omitted, zero);

        let vehicles = VehicleFilter {
            per_page: Some(10_000),
            ..Default::default()
        }
        .normalized();
        assert_eq!(vehicles.page, Some(1));
        assert_eq!(vehicles.per_page, Some(MAX_PER_PAGE));
    }

    #[test]
    fn paginate_clamps_inputs() {
        let page = ListPage::paginate((0..10).collect::<Vec<i32>>(), Some(0), Some(0));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.items, vec![0]);

        let past_end = ListPage::paginate((0..10).collect::<Vec<i32>>(), Some(5), Some(5));
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 10);
    }
}
