use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    BookingFilter, BookingRepo, CreateBookingParams, ListPage, RepoError,
};
use crate::domain::entities::BookingRecord;
use crate::domain::types::BookingStatus;

use super::InMemoryRepositories;

#[async_trait]
impl BookingRepo for InMemoryRepositories {
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<ListPage<BookingRecord>, RepoError> {
        let tables = self.tables.read().await;

        let mut bookings: Vec<BookingRecord> = tables
            .bookings
            .values()
            .filter(|b| filter.vehicle_id.is_none_or(|id| b.vehicle_id == id))
            .filter(|b| filter.customer_id.is_none_or(|id| b.customer_id == id))
            .filter(|b| filter.status.is_none_or(|status| b.status == status))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(ListPage::paginate(bookings, filter.page, filter.per_page))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, RepoError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn create_booking(&self, params: CreateBookingParams) -> Result<BookingRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let overlapping = tables.bookings.values().any(|existing| {
            existing.vehicle_id == params.vehicle_id
                && existing.status.is_open()
                && existing.overlaps(params.start_date, params.end_date)
        });
        if overlapping {
            return Err(RepoError::Duplicate {
                constraint: "bookings_vehicle_dates_excl".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let booking = BookingRecord {
            id: Uuid::new_v4(),
            vehicle_id: params.vehicle_id,
            customer_id: params.customer_id,
            start_date: params.start_date,
            end_date: params.end_date,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<BookingRecord, RepoError> {
        let mut tables = self.tables.write().await;
        let booking = tables.bookings.get_mut(&id).ok_or(RepoError::NotFound)?;
        booking.status = status;
        booking.updated_at = OffsetDateTime::now_utc();
        Ok(booking.clone())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError> {
        self.tables
            .write()
            .await
            .bookings
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}
