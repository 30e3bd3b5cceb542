use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateMaintenancePlanParams, MaintenanceRepo, RepoError};
use crate::domain::entities::MaintenancePlanRecord;
use crate::domain::maintenance::MaintenancePlan;

use super::InMemoryRepositories;

#[async_trait]
impl MaintenanceRepo for InMemoryRepositories {
    async fn list_plans(&self) -> Result<Vec<MaintenancePlanRecord>, RepoError> {
        let tables = self.tables.read().await;
        let mut plans: Vec<MaintenancePlanRecord> =
            tables.maintenance_plans.values().cloned().collect();
        plans.sort_by_key(|plan| plan.created_at);
        Ok(plans)
    }

    async fn find_plan(&self, id: Uuid) -> Result<Option<MaintenancePlanRecord>, RepoError> {
        Ok(self.tables.read().await.maintenance_plans.get(&id).cloned())
    }

    async fn create_plan(
        &self,
        params: CreateMaintenancePlanParams,
    ) -> Result<MaintenancePlanRecord, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.vehicles.contains_key(&params.vehicle_id) {
            return Err(RepoError::Integrity {
                message: "maintenance plan references unknown vehicle".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = MaintenancePlanRecord {
            id: Uuid::new_v4(),
            vehicle_id: params.vehicle_id,
            title: params.title,
            plan: params.plan,
            created_at: now,
            updated_at: now,
        };
        tables.maintenance_plans.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_plan(
        &self,
        id: Uuid,
        plan: MaintenancePlan,
    ) -> Result<MaintenancePlanRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .maintenance_plans
            .get_mut(&id)
            .ok_or(RepoError::NotFound)?;
        record.plan = plan;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }
}
