use std::sync::Arc;

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    CreateVehicleParams, ListPage, MAX_PER_PAGE, RepoError, UpdateVehicleParams, VehicleFilter,
    VehicleRepo,
};
use crate::cache::{CacheAside, InvalidationRouter, KeyParams, Namespace, Tag, build_key, entity_key};
use crate::domain::entities::VehicleRecord;
use crate::domain::types::VehicleStatus;

const MIN_MODEL_YEAR: i32 = 1950;
const MAX_MODEL_YEAR: i32 = 2100;

#[derive(Clone)]
pub struct VehicleService {
    repo: Arc<dyn VehicleRepo>,
    cache: Arc<CacheAside>,
    invalidation: Arc<InvalidationRouter>,
}

#[derive(Debug, Clone)]
pub struct CreateVehicleCommand {
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub daily_rate_cents: i64,
    pub mileage_km: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateVehicleCommand {
    pub status: Option<VehicleStatus>,
    pub daily_rate_cents: Option<i64>,
    pub mileage_km: Option<u32>,
}

impl VehicleService {
    pub fn new(
        repo: Arc<dyn VehicleRepo>,
        cache: Arc<CacheAside>,
        invalidation: Arc<InvalidationRouter>,
    ) -> Self {
        Self {
            repo,
            cache,
            invalidation,
        }
    }

    pub async fn list(&self, filter: VehicleFilter) -> Result<ListPage<VehicleRecord>, AppError> {
        let filter = filter.normalized();
        let key = build_key(
            Namespace::Vehicle.as_str(),
            &KeyParams::from_serializable(&filter)?,
        );
        let repo = Arc::clone(&self.repo);

        self.cache
            .query_tagged(
                &key,
                Namespace::Vehicle.default_ttl(),
                [Tag::Namespace(Namespace::Vehicle)],
                move || async move { repo.list_vehicles(&filter).await.map_err(AppError::from) },
            )
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<VehicleRecord, AppError> {
        let repo = Arc::clone(&self.repo);

        self.cache
            .query_tagged(
                &entity_key(Namespace::Vehicle, id),
                Namespace::Vehicle.default_ttl(),
                [
                    Tag::Namespace(Namespace::Vehicle),
                    Tag::entity(Namespace::Vehicle, id),
                ],
                move || async move { repo.find_vehicle(id).await?.ok_or(AppError::NotFound) },
            )
            .await
    }

    pub async fn create(&self, command: CreateVehicleCommand) -> Result<VehicleRecord, AppError> {
        ensure_non_empty(&command.plate, "plate")?;
        ensure_non_empty(&command.make, "make")?;
        ensure_non_empty(&command.model, "model")?;
        if !(MIN_MODEL_YEAR..=MAX_MODEL_YEAR).contains(&command.year) {
            return Err(AppError::validation(format!(
                "year must be between {MIN_MODEL_YEAR} and {MAX_MODEL_YEAR}"
            )));
        }
        ensure_non_negative(command.daily_rate_cents, "daily_rate_cents")?;

        let vehicle = self
            .repo
            .create_vehicle(CreateVehicleParams {
                plate: command.plate.trim().to_ascii_uppercase(),
                make: command.make.trim().to_string(),
                model: command.model.trim().to_string(),
                year: command.year,
                daily_rate_cents: command.daily_rate_cents,
                mileage_km: command.mileage_km,
            })
            .await?;

        self.invalidation.invalidate_vehicle_cache(Some(vehicle.id));
        Ok(vehicle)
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateVehicleCommand,
    ) -> Result<VehicleRecord, AppError> {
        if let Some(rate) = command.daily_rate_cents {
            ensure_non_negative(rate, "daily_rate_cents")?;
        }

        let vehicle = self
            .repo
            .update_vehicle(UpdateVehicleParams {
                id,
                status: command.status,
                daily_rate_cents: command.daily_rate_cents,
                mileage_km: command.mileage_km,
            })
            .await?;

        self.invalidation.invalidate_vehicle_cache(Some(id));
        Ok(vehicle)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.repo.delete_vehicle(id).await?;
        self.invalidation.invalidate_vehicle_cache(Some(id));
        Ok(())
    }
}

/// Read every vehicle, page by page.
pub(crate) async fn all_vehicles(repo: &dyn VehicleRepo) -> Result<Vec<VehicleRecord>, RepoError> {
    let mut vehicles = Vec::new();
    let mut page = 1;
    loop {
        let batch = repo
            .list_vehicles(&VehicleFilter {
                page: Some(page),
                per_page: Some(MAX_PER_PAGE),
                ..Default::default()
            })
            .await?;
        let fetched = batch.items.len();
        vehicles.extend(batch.items);
        if fetched < MAX_PER_PAGE as usize || vehicles.len() >= batch.total {
            return Ok(vehicles);
        }
        page += 1;
    }
}

pub(crate) fn ensure_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(value: i64, field: &str) -> Result<(), AppError> {
    if value < 0 {
        return Err(AppError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}
