mod bookings;
mod cache;
mod dashboard;
mod maintenance;
mod recurring;
mod vehicles;

pub use bookings::{create_booking, delete_booking, get_booking, list_bookings, update_booking_status};
pub use cache::{cache_stats, clear_cache, purge_cache, sweep_cache};
pub use dashboard::dashboard;
pub use maintenance::{complete_maintenance, create_maintenance_plan, maintenance_due};
pub use recurring::{create_recurring_expense, list_recurring_expenses, process_recurring_expenses};
pub use vehicles::{create_vehicle, delete_vehicle, get_vehicle, list_vehicles, update_vehicle};

use time::{Date, OffsetDateTime};

use super::models::AsOfQuery;

fn as_of(query: &AsOfQuery) -> Date {
    query
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date())
}
