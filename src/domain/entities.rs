//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::{
    maintenance::MaintenancePlan,
    recurrence::RecurringSchedule,
    types::{BookingStatus, VehicleStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
    pub id: Uuid,
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub status: VehicleStatus,
    pub daily_rate_cents: i64,
    pub mileage_km: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRecord {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub status: BookingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BookingRecord {
    /// Whether the booking's inclusive date range contains `day`.
    pub fn covers(&self, day: Date) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    pub fn overlaps(&self, start: Date, end: Date) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringExpenseRecord {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub description: String,
    pub amount_cents: i64,
    pub schedule: RecurringSchedule,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A booked expense, produced by processing a recurring expense occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseRecord {
    pub id: Uuid,
    pub recurring_expense_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenancePlanRecord {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub title: String,
    pub plan: MaintenancePlan,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
