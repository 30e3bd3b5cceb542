//! Recurring expenses and their due-date processor.
//!
//! Processing books one expense per due occurrence and advances the schedule
//! after each booked occurrence, so an interrupted run resumes where it
//! stopped instead of booking the same occurrence twice.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use time::Date;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    CreateExpenseParams, CreateRecurringExpenseParams, RecurringExpenseFilter,
    RecurringExpenseRepo,
};
use crate::application::vehicles::ensure_non_empty;
use crate::cache::{CacheAside, InvalidationRouter, KeyParams, Namespace, Tag, build_key};
use crate::domain::entities::RecurringExpenseRecord;
use crate::domain::error::DomainError;
use crate::domain::recurrence::{Interval, IntervalKind, RecurringSchedule};
use crate::domain::types::RecurrenceState;

pub(crate) const METRIC_RECURRING_OCCURRENCE: &str = "fleetdesk_recurring_occurrence_total";

#[derive(Debug, Clone)]
pub struct CreateRecurringExpenseCommand {
    pub vehicle_id: Option<Uuid>,
    pub description: String,
    pub amount_cents: i64,
    pub anchor_date: Date,
    pub interval: IntervalKind,
    pub custom_interval_days: Option<u32>,
    pub total_occurrences_limit: Option<u32>,
}

/// Outcome of one processor run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub schedules_processed: usize,
    pub occurrences: usize,
    pub completed: usize,
    pub failures: usize,
    /// Schedules still behind after this run's per-schedule cap.
    pub pending: usize,
}

#[derive(Clone)]
pub struct RecurringExpenseService {
    repo: Arc<dyn RecurringExpenseRepo>,
    cache: Arc<CacheAside>,
    invalidation: Arc<InvalidationRouter>,
    run_lock: Arc<AsyncMutex<()>>,
}

impl RecurringExpenseService {
    pub fn new(
        repo: Arc<dyn RecurringExpenseRepo>,
        cache: Arc<CacheAside>,
        invalidation: Arc<InvalidationRouter>,
    ) -> Self {
        Self {
            repo,
            cache,
            invalidation,
            run_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    pub async fn list(
        &self,
        filter: RecurringExpenseFilter,
    ) -> Result<Vec<RecurringExpenseRecord>, AppError> {
        let key = build_key(
            "expense:recurring",
            &KeyParams::from_serializable(&filter)?,
        );
        let repo = Arc::clone(&self.repo);

        self.cache
            .query_tagged(
                &key,
                Namespace::Expense.default_ttl(),
                [Tag::Namespace(Namespace::Expense)],
                move || async move {
                    repo.list_recurring_expenses(&filter)
                        .await
                        .map_err(AppError::from)
                },
            )
            .await
    }

    pub async fn create(
        &self,
        command: CreateRecurringExpenseCommand,
    ) -> Result<RecurringExpenseRecord, AppError> {
        ensure_non_empty(&command.description, "description")?;
        if command.amount_cents <= 0 {
            return Err(AppError::validation("amount_cents must be positive"));
        }
        if command.total_occurrences_limit == Some(0) {
            return Err(AppError::validation(
                "total_occurrences_limit must be at least 1",
            ));
        }

        let interval = Interval::from_parts(command.interval, command.custom_interval_days)
            .map_err(DomainError::from)?;
        let schedule = RecurringSchedule::new(
            command.anchor_date,
            interval,
            command.total_occurrences_limit,
        );
        // Reject anchors whose first occurrence cannot be represented.
        schedule.next_due_date().map_err(DomainError::from)?;

        let record = self
            .repo
            .create_recurring_expense(CreateRecurringExpenseParams {
                vehicle_id: command.vehicle_id,
                description: command.description.trim().to_string(),
                amount_cents: command.amount_cents,
                schedule,
            })
            .await?;

        self.invalidation.invalidate_expense_cache(Some(record.id));
        Ok(record)
    }

    /// Book every occurrence due on or before `today`.
    ///
    /// Runs are serialised; a second caller waits for the first to finish and
    /// then finds nothing left to do.
    pub async fn process_due(&self, today: Date) -> Result<ProcessSummary, AppError> {
        let _run = self.run_lock.lock().await;

        let records = self
            .repo
            .list_recurring_expenses(&RecurringExpenseFilter {
                active_only: Some(true),
                ..Default::default()
            })
            .await?;

        let mut summary = ProcessSummary::default();
        for record in records {
            match self.process_record(&record, today, &mut summary).await {
                Ok(true) => summary.schedules_processed += 1,
                Ok(false) => {}
                Err(err) => {
                    summary.failures += 1;
                    warn!(
                        recurring_expense_id = %record.id,
                        error = %err,
                        "Recurring expense processing failed"
                    );
                }
            }
        }

        if summary.occurrences > 0 || summary.failures > 0 {
            self.invalidation.invalidate_financial_cache();
        }
        counter!(METRIC_RECURRING_OCCURRENCE).increment(summary.occurrences as u64);
        info!(
            %today,
            schedules = summary.schedules_processed,
            occurrences = summary.occurrences,
            completed = summary.completed,
            failures = summary.failures,
            pending = summary.pending,
            "Recurring expenses processed"
        );

        Ok(summary)
    }

    /// Returns whether anything was booked for this record.
    async fn process_record(
        &self,
        record: &RecurringExpenseRecord,
        today: Date,
        summary: &mut ProcessSummary,
    ) -> Result<bool, AppError> {
        let due_dates = record
            .schedule
            .clone()
            .process_due(today)
            .map_err(DomainError::from)?;
        if due_dates.is_empty() {
            return Ok(false);
        }

        let mut schedule = record.schedule.clone();
        for due in due_dates {
            self.repo
                .create_expense(CreateExpenseParams {
                    recurring_expense_id: Some(record.id),
                    vehicle_id: record.vehicle_id,
                    description: record.description.clone(),
                    amount_cents: record.amount_cents,
                    incurred_on: due,
                })
                .await?;
            schedule.process_due(due).map_err(DomainError::from)?;
            self.repo
                .update_schedule(record.id, schedule.clone())
                .await?;
            summary.occurrences += 1;
        }

        if schedule.is_due(today).map_err(DomainError::from)? {
            summary.pending += 1;
            warn!(
                recurring_expense_id = %record.id,
                anchor_date = %schedule.anchor_date,
                "Recurring expense still behind; remaining occurrences wait for the next run"
            );
        }
        if schedule.state() == RecurrenceState::Completed {
            summary.completed += 1;
            info!(recurring_expense_id = %record.id, "Recurring expense completed");
        }
        Ok(true)
    }
}
