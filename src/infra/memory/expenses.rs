use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    CreateExpenseParams, CreateRecurringExpenseParams, RecurringExpenseFilter,
    RecurringExpenseRepo, RepoError,
};
use crate::domain::entities::{ExpenseRecord, RecurringExpenseRecord};
use crate::domain::recurrence::RecurringSchedule;
use crate::domain::types::RecurrenceState;

use super::InMemoryRepositories;

#[async_trait]
impl RecurringExpenseRepo for InMemoryRepositories {
    async fn list_recurring_expenses(
        &self,
        filter: &RecurringExpenseFilter,
    ) -> Result<Vec<RecurringExpenseRecord>, RepoError> {
        let tables = self.tables.read().await;
        let active_only = filter.active_only.unwrap_or(false);

        let mut records: Vec<RecurringExpenseRecord> = tables
            .recurring_expenses
            .values()
            .filter(|r| filter.vehicle_id.is_none_or(|id| r.vehicle_id == Some(id)))
            .filter(|r| !active_only || r.schedule.state() == RecurrenceState::Active)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.schedule
                .anchor_date
                .cmp(&b.schedule.anchor_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(records)
    }

    async fn create_recurring_expense(
        &self,
        params: CreateRecurringExpenseParams,
    ) -> Result<RecurringExpenseRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = RecurringExpenseRecord {
            id: Uuid::new_v4(),
            vehicle_id: params.vehicle_id,
            description: params.description,
            amount_cents: params.amount_cents,
            schedule: params.schedule,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .recurring_expenses
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        schedule: RecurringSchedule,
    ) -> Result<RecurringExpenseRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .recurring_expenses
            .get_mut(&id)
            .ok_or(RepoError::NotFound)?;
        record.schedule = schedule;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn create_expense(&self, params: CreateExpenseParams) -> Result<ExpenseRecord, RepoError> {
        let expense = ExpenseRecord {
            id: Uuid::new_v4(),
            recurring_expense_id: params.recurring_expense_id,
            vehicle_id: params.vehicle_id,
            description: params.description,
            amount_cents: params.amount_cents,
            incurred_on: params.incurred_on,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.write().await.expenses.push(expense.clone());
        Ok(expense)
    }

    async fn list_expenses(&self, from: Date, to: Date) -> Result<Vec<ExpenseRecord>, RepoError> {
        if to < from {
            return Err(RepoError::InvalidInput {
                message: "`to` precedes `from`".to_string(),
            });
        }
        let tables = self.tables.read().await;
        let mut expenses: Vec<ExpenseRecord> = tables
            .expenses
            .iter()
            .filter(|e| from <= e.incurred_on && e.incurred_on <= to)
            .cloned()
            .collect();
        expenses.sort_by_key(|e| e.incurred_on);
        Ok(expenses)
    }
}
