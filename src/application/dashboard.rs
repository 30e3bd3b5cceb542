//! Per-user back-office dashboard.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::Date;
use tracing::warn;
use uuid::Uuid;

use crate::application::bookings::all_bookings;
use crate::application::error::AppError;
use crate::application::repos::{
    BookingRepo, MaintenanceRepo, RecurringExpenseFilter, RecurringExpenseRepo, VehicleRepo,
};
use crate::application::vehicles::all_vehicles;
use crate::cache::{CacheAside, KeyParams, Namespace, Tag, build_key};
use crate::domain::types::{MaintenanceStatus, VehicleStatus};

const AVERAGE_MONTH_DAYS: f64 = 365.25 / 12.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub available: usize,
    pub rented: usize,
    pub maintenance: usize,
    pub retired: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub user_id: String,
    pub as_of: Date,
    pub fleet: FleetSummary,
    pub open_bookings: usize,
    pub bookings_on_date: usize,
    pub monthly_recurring_cents: i64,
    pub maintenance_due_soon: usize,
    pub maintenance_overdue: usize,
}

#[derive(Clone)]
pub struct DashboardService {
    vehicles: Arc<dyn VehicleRepo>,
    bookings: Arc<dyn BookingRepo>,
    recurring: Arc<dyn RecurringExpenseRepo>,
    maintenance: Arc<dyn MaintenanceRepo>,
    cache: Arc<CacheAside>,
    maintenance_lead_days: u32,
}

impl DashboardService {
    pub fn new(
        vehicles: Arc<dyn VehicleRepo>,
        bookings: Arc<dyn BookingRepo>,
        recurring: Arc<dyn RecurringExpenseRepo>,
        maintenance: Arc<dyn MaintenanceRepo>,
        cache: Arc<CacheAside>,
        maintenance_lead_days: u32,
    ) -> Self {
        Self {
            vehicles,
            bookings,
            recurring,
            maintenance,
            cache,
            maintenance_lead_days,
        }
    }

    pub async fn summary(&self, user_id: &str, today: Date) -> Result<DashboardSummary, AppError> {
        let key = build_key(
            Namespace::Dashboard.as_str(),
            &KeyParams::new()
                .with("user", user_id)
                .with("as_of", today.to_string()),
        );
        let service = self.clone();
        let user = user_id.to_string();

        self.cache
            .query_tagged(
                &key,
                self.cache.default_ttl(),
                [Tag::Namespace(Namespace::Dashboard), Tag::user(user_id)],
                move || async move { service.compute(user, today).await },
            )
            .await
    }

    async fn compute(&self, user_id: String, today: Date) -> Result<DashboardSummary, AppError> {
        let vehicles = all_vehicles(self.vehicles.as_ref()).await?;
        let bookings = all_bookings(self.bookings.as_ref()).await?;
        let recurring = self
            .recurring
            .list_recurring_expenses(&RecurringExpenseFilter {
                active_only: Some(true),
                ..Default::default()
            })
            .await?;
        let plans = self.maintenance.list_plans().await?;

        let mut fleet = FleetSummary {
            total: vehicles.len(),
            ..Default::default()
        };
        for vehicle in &vehicles {
            match vehicle.status {
                VehicleStatus::Available => fleet.available += 1,
                VehicleStatus::Rented => fleet.rented += 1,
                VehicleStatus::Maintenance => fleet.maintenance += 1,
                VehicleStatus::Retired => fleet.retired += 1,
            }
        }

        let open_bookings = bookings.iter().filter(|b| b.status.is_open()).count();
        let bookings_on_date = bookings
            .iter()
            .filter(|b| b.status.is_open() && b.covers(today))
            .count();

        let monthly_recurring_cents = recurring
            .iter()
            .map(|expense| {
                let per_month = AVERAGE_MONTH_DAYS / expense.schedule.interval.approximate_days();
                (expense.amount_cents as f64 * per_month).round() as i64
            })
            .sum();

        let mileage: HashMap<Uuid, u32> = vehicles.iter().map(|v| (v.id, v.mileage_km)).collect();
        let mut maintenance_due_soon = 0;
        let mut maintenance_overdue = 0;
        for record in &plans {
            let current = mileage.get(&record.vehicle_id).copied();
            match record
                .plan
                .status(today, current, self.maintenance_lead_days)
            {
                Ok(due) => match due.status {
                    MaintenanceStatus::DueSoon => maintenance_due_soon += 1,
                    MaintenanceStatus::Overdue => maintenance_overdue += 1,
                    MaintenanceStatus::Scheduled => {}
                },
                Err(err) => {
                    warn!(plan_id = %record.id, error = %err, "Skipping maintenance plan on dashboard");
                }
            }
        }

        Ok(DashboardSummary {
            user_id,
            as_of: today,
            fleet,
            open_bookings,
            bookings_on_date,
            monthly_recurring_cents,
            maintenance_due_soon,
            maintenance_overdue,
        })
    }
}
