use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateVehicleParams, ListPage, RepoError, UpdateVehicleParams, VehicleFilter, VehicleRepo,
};
use crate::domain::entities::VehicleRecord;
use crate::domain::types::VehicleStatus;

use super::InMemoryRepositories;

#[async_trait]
impl VehicleRepo for InMemoryRepositories {
    async fn list_vehicles(
        &self,
        filter: &VehicleFilter,
    ) -> Result<ListPage<VehicleRecord>, RepoError> {
        let tables = self.tables.read().await;
        let search = filter.search.as_deref().map(str::to_lowercase);

        let mut vehicles: Vec<VehicleRecord> = tables
            .vehicles
            .values()
            .filter(|vehicle| filter.status.is_none_or(|status| vehicle.status == status))
            .filter(|vehicle| {
                search.as_deref().is_none_or(|needle| {
                    vehicle.plate.to_lowercase().contains(needle)
                        || vehicle.make.to_lowercase().contains(needle)
                        || vehicle.model.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        vehicles.sort_by(|a, b| a.plate.cmp(&b.plate));

        Ok(ListPage::paginate(vehicles, filter.page, filter.per_page))
    }

    async fn find_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>, RepoError> {
        Ok(self.tables.read().await.vehicles.get(&id).cloned())
    }

    async fn create_vehicle(&self, params: CreateVehicleParams) -> Result<VehicleRecord, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .vehicles
            .values()
            .any(|vehicle| vehicle.plate == params.plate)
        {
            return Err(RepoError::Duplicate {
                constraint: "vehicles_plate_key".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let vehicle = VehicleRecord {
            id: Uuid::new_v4(),
            plate: params.plate,
            make: params.make,
            model: params.model,
            year: params.year,
            status: VehicleStatus::Available,
            daily_rate_cents: params.daily_rate_cents,
            mileage_km: params.mileage_km,
            created_at: now,
            updated_at: now,
        };
        tables.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn update_vehicle(&self, params: UpdateVehicleParams) -> Result<VehicleRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let vehicle = tables
            .vehicles
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;

        if let Some(status) = params.status {
            vehicle.status = status;
        }
        if let Some(rate) = params.daily_rate_cents {
            vehicle.daily_rate_cents = rate;
        }
        if let Some(mileage) = params.mileage_km {
            if mileage < vehicle.mileage_km {
                return Err(RepoError::InvalidInput {
                    message: "mileage cannot decrease".to_string(),
                });
            }
            vehicle.mileage_km = mileage;
        }
        vehicle.updated_at = OffsetDateTime::now_utc();
        Ok(vehicle.clone())
    }

    async fn delete_vehicle(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.vehicles.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if tables
            .bookings
            .values()
            .any(|booking| booking.vehicle_id == id && booking.status.is_open())
        {
            return Err(RepoError::Integrity {
                message: "vehicle has open bookings".to_string(),
            });
        }
        tables.vehicles.remove(&id);
        Ok(())
    }
}
