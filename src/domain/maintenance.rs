//! Vehicle service plans.
//!
//! A plan is due when either its date interval or its mileage interval has
//! elapsed since the last service, whichever comes first.

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use super::error::DomainError;
use super::recurrence::{Interval, ScheduleError, next_due_date};
use super::types::MaintenanceStatus;

/// Distance before the service mileage at which a plan counts as due soon.
pub const MILEAGE_LEAD_KM: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub interval: Interval,
    pub last_service_date: Date,
    pub mileage_interval_km: Option<u32>,
    pub last_service_mileage_km: Option<u32>,
}

/// Where a plan stands on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaintenanceDue {
    pub due_date: Date,
    pub due_mileage_km: Option<u32>,
    pub status: MaintenanceStatus,
}

impl MaintenancePlan {
    pub fn new(
        interval: Interval,
        last_service_date: Date,
        mileage_interval_km: Option<u32>,
        last_service_mileage_km: Option<u32>,
    ) -> Result<Self, DomainError> {
        if mileage_interval_km == Some(0) {
            return Err(DomainError::validation(
                "mileage_interval_km",
                "must be greater than zero",
            ));
        }
        Ok(Self {
            interval,
            last_service_date,
            mileage_interval_km,
            last_service_mileage_km,
        })
    }

    pub fn due_date(&self) -> Result<Date, ScheduleError> {
        next_due_date(self.last_service_date, self.interval)
    }

    pub fn due_mileage_km(&self) -> Option<u32> {
        let interval = self.mileage_interval_km?;
        Some(self.last_service_mileage_km.unwrap_or(0).saturating_add(interval))
    }

    /// Classify the plan for `today`.
    ///
    /// Overdue once the due date has passed or the odometer has reached the
    /// service mileage; due soon within `lead_days` of the date or
    /// `MILEAGE_LEAD_KM` of the mileage.
    pub fn status(
        &self,
        today: Date,
        current_mileage_km: Option<u32>,
        lead_days: u32,
    ) -> Result<MaintenanceDue, ScheduleError> {
        let due_date = self.due_date()?;
        let due_mileage_km = self.due_mileage_km();

        let mileage = current_mileage_km.zip(due_mileage_km);
        let mileage_overdue = mileage.is_some_and(|(current, due)| current >= due);
        let mileage_soon =
            mileage.is_some_and(|(current, due)| current.saturating_add(MILEAGE_LEAD_KM) >= due);

        let reminder_from = due_date
            .checked_sub(Duration::days(i64::from(lead_days)))
            .unwrap_or(Date::MIN);

        let status = if today > due_date || mileage_overdue {
            MaintenanceStatus::Overdue
        } else if today >= reminder_from || mileage_soon {
            MaintenanceStatus::DueSoon
        } else {
            MaintenanceStatus::Scheduled
        };

        Ok(MaintenanceDue {
            due_date,
            due_mileage_km,
            status,
        })
    }

    /// Record a completed service, restarting both intervals.
    pub fn complete(&mut self, serviced_on: Date, mileage_km: Option<u32>) -> Result<(), DomainError> {
        if serviced_on < self.last_service_date {
            return Err(DomainError::ServiceOutOfOrder {
                previous: self.last_service_date,
                serviced_on,
            });
        }
        self.last_service_date = serviced_on;
        if mileage_km.is_some() {
            self.last_service_mileage_km = mileage_km;
        }
        Ok(())
    }
}
