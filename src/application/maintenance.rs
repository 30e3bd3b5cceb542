use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::Date;
use tracing::warn;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    CreateMaintenancePlanParams, MaintenanceRepo, UpdateVehicleParams, VehicleRepo,
};
use crate::application::vehicles::{all_vehicles, ensure_non_empty};
use crate::cache::{CacheAside, InvalidationRouter, KeyParams, Namespace, Tag, build_key};
use crate::domain::entities::MaintenancePlanRecord;
use crate::domain::error::DomainError;
use crate::domain::maintenance::MaintenancePlan;
use crate::domain::recurrence::{Interval, IntervalKind};
use crate::domain::types::MaintenanceStatus;

#[derive(Debug, Clone)]
pub struct CreateMaintenancePlanCommand {
    pub vehicle_id: Uuid,
    pub title: String,
    pub interval: IntervalKind,
    pub custom_interval_days: Option<u32>,
    pub last_service_date: Date,
    pub mileage_interval_km: Option<u32>,
    pub last_service_mileage_km: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceDueItem {
    pub plan_id: Uuid,
    pub vehicle_id: Uuid,
    pub plate: Option<String>,
    pub title: String,
    pub due_date: Date,
    pub due_mileage_km: Option<u32>,
    pub current_mileage_km: Option<u32>,
    pub status: MaintenanceStatus,
}

#[derive(Clone)]
pub struct MaintenanceService {
    plans: Arc<dyn MaintenanceRepo>,
    vehicles: Arc<dyn VehicleRepo>,
    cache: Arc<CacheAside>,
    invalidation: Arc<InvalidationRouter>,
    lead_days: u32,
}

impl MaintenanceService {
    pub fn new(
        plans: Arc<dyn MaintenanceRepo>,
        vehicles: Arc<dyn VehicleRepo>,
        cache: Arc<CacheAside>,
        invalidation: Arc<InvalidationRouter>,
        lead_days: u32,
    ) -> Self {
        Self {
            plans,
            vehicles,
            cache,
            invalidation,
            lead_days,
        }
    }

    pub async fn create(
        &self,
        command: CreateMaintenancePlanCommand,
    ) -> Result<MaintenancePlanRecord, AppError> {
        ensure_non_empty(&command.title, "title")?;
        self.vehicles
            .find_vehicle(command.vehicle_id)
            .await?
            .ok_or_else(|| DomainError::not_found("vehicle"))?;

        let interval = Interval::from_parts(command.interval, command.custom_interval_days)
            .map_err(DomainError::from)?;
        let plan = MaintenancePlan::new(
            interval,
            command.last_service_date,
            command.mileage_interval_km,
            command.last_service_mileage_km,
        )?;
        plan.due_date().map_err(DomainError::from)?;

        let record = self
            .plans
            .create_plan(CreateMaintenancePlanParams {
                vehicle_id: command.vehicle_id,
                title: command.title.trim().to_string(),
                plan,
            })
            .await?;

        self.invalidation
            .invalidate_maintenance_cache(Some(record.vehicle_id));
        Ok(record)
    }

    /// Plans that are due soon or overdue on `today`, most urgent first.
    pub async fn due(&self, today: Date) -> Result<Vec<MaintenanceDueItem>, AppError> {
        let key = build_key(
            Namespace::Maintenance.as_str(),
            &KeyParams::new()
                .with("due_on", today.to_string())
                .with("lead_days", self.lead_days),
        );
        let service = self.clone();

        self.cache
            .query_tagged(
                &key,
                Namespace::Maintenance.default_ttl(),
                [Tag::Namespace(Namespace::Maintenance)],
                move || async move { service.compute_due(today).await },
            )
            .await
    }

    /// Record a completed service and restart the plan's intervals.
    pub async fn complete(
        &self,
        id: Uuid,
        serviced_on: Date,
        mileage_km: Option<u32>,
    ) -> Result<MaintenancePlanRecord, AppError> {
        let mut record = self.plans.find_plan(id).await?.ok_or(AppError::NotFound)?;
        record.plan.complete(serviced_on, mileage_km)?;
        let record = self.plans.update_plan(id, record.plan).await?;

        if let Some(mileage_km) = mileage_km
            && let Some(vehicle) = self.vehicles.find_vehicle(record.vehicle_id).await?
            && mileage_km > vehicle.mileage_km
        {
            self.vehicles
                .update_vehicle(UpdateVehicleParams {
                    id: vehicle.id,
                    mileage_km: Some(mileage_km),
                    ..Default::default()
                })
                .await?;
        }

        self.invalidation
            .invalidate_maintenance_cache(Some(record.vehicle_id));
        Ok(record)
    }

    async fn compute_due(&self, today: Date) -> Result<Vec<MaintenanceDueItem>, AppError> {
        let plans = self.plans.list_plans().await?;
        let vehicles: HashMap<Uuid, _> = all_vehicles(self.vehicles.as_ref())
            .await?
            .into_iter()
            .map(|vehicle| (vehicle.id, vehicle))
            .collect();

        let mut items = Vec::new();
        for record in plans {
            let vehicle = vehicles.get(&record.vehicle_id);
            let current_mileage_km = vehicle.map(|v| v.mileage_km);
            let due = match record.plan.status(today, current_mileage_km, self.lead_days) {
                Ok(due) => due,
                Err(err) => {
                    warn!(plan_id = %record.id, error = %err, "Maintenance plan has no computable due date");
                    continue;
                }
            };
            if due.status == MaintenanceStatus::Scheduled {
                continue;
            }
            items.push(MaintenanceDueItem {
                plan_id: record.id,
                vehicle_id: record.vehicle_id,
                plate: vehicle.map(|v| v.plate.clone()),
                title: record.title,
                due_date: due.due_date,
                due_mileage_km: due.due_mileage_km,
                current_mileage_km,
                status: due.status,
            });
        }

        items.sort_by(|a, b| {
            b.status
                .cmp(&a.status)
                .then_with(|| a.due_date.cmp(&b.due_date))
        });
        Ok(items)
    }
}
