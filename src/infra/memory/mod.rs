//! In-memory repository implementations.
//!
//! One `InMemoryRepositories` value implements every repository trait so the
//! services can share a single backing store, the way a connection pool would
//! be shared.

mod bookings;
mod expenses;
mod maintenance;
mod vehicles;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::{
    BookingRecord, ExpenseRecord, MaintenancePlanRecord, RecurringExpenseRecord, VehicleRecord,
};

#[derive(Default)]
struct Tables {
    vehicles: HashMap<Uuid, VehicleRecord>,
    bookings: HashMap<Uuid, BookingRecord>,
    recurring_expenses: HashMap<Uuid, RecurringExpenseRecord>,
    expenses: Vec<ExpenseRecord>,
    maintenance_plans: HashMap<Uuid, MaintenancePlanRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}
