use std::sync::Arc;

use time::Date;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    BookingFilter, BookingRepo, CreateBookingParams, ListPage, MAX_PER_PAGE, RepoError,
    VehicleRepo,
};
use crate::cache::{CacheAside, InvalidationRouter, KeyParams, Namespace, Tag, build_key, entity_key};
use crate::domain::entities::BookingRecord;
use crate::domain::error::DomainError;
use crate::domain::types::BookingStatus;

/// Longest booking accepted in one request.
const MAX_BOOKING_DAYS: i64 = 366;

#[derive(Clone)]
pub struct BookingService {
    bookings: Arc<dyn BookingRepo>,
    vehicles: Arc<dyn VehicleRepo>,
    cache: Arc<CacheAside>,
    invalidation: Arc<InvalidationRouter>,
}

#[derive(Debug, Clone)]
pub struct CreateBookingCommand {
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepo>,
        vehicles: Arc<dyn VehicleRepo>,
        cache: Arc<CacheAside>,
        invalidation: Arc<InvalidationRouter>,
    ) -> Self {
        Self {
            bookings,
            vehicles,
            cache,
            invalidation,
        }
    }

    pub async fn list(&self, filter: BookingFilter) -> Result<ListPage<BookingRecord>, AppError> {
        let filter = filter.normalized();
        let key = build_key(
            Namespace::Booking.as_str(),
            &KeyParams::from_serializable(&filter)?,
        );
        let mut tags = vec![Tag::Namespace(Namespace::Booking)];
        if let Some(vehicle_id) = filter.vehicle_id {
            tags.push(Tag::entity(Namespace::Vehicle, vehicle_id));
        }
        if let Some(customer_id) = filter.customer_id {
            tags.push(Tag::entity(Namespace::Customer, customer_id));
        }
        let repo = Arc::clone(&self.bookings);

        self.cache
            .query_tagged(
                &key,
                Namespace::Booking.default_ttl(),
                tags,
                move || async move { repo.list_bookings(&filter).await.map_err(AppError::from) },
            )
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<BookingRecord, AppError> {
        let repo = Arc::clone(&self.bookings);

        self.cache
            .query_tagged(
                &entity_key(Namespace::Booking, id),
                Namespace::Booking.default_ttl(),
                [
                    Tag::Namespace(Namespace::Booking),
                    Tag::entity(Namespace::Booking, id),
                ],
                move || async move { repo.find_booking(id).await?.ok_or(AppError::NotFound) },
            )
            .await
    }

    pub async fn create(&self, command: CreateBookingCommand) -> Result<BookingRecord, AppError> {
        if command.end_date < command.start_date {
            return Err(DomainError::DateRange {
                start: command.start_date,
                end: command.end_date,
            }
            .into());
        }
        if (command.end_date - command.start_date).whole_days() >= MAX_BOOKING_DAYS {
            return Err(AppError::validation(format!(
                "bookings are limited to {MAX_BOOKING_DAYS} days"
            )));
        }

        let vehicle = self
            .vehicles
            .find_vehicle(command.vehicle_id)
            .await?
            .ok_or_else(|| DomainError::not_found("vehicle"))?;
        if !vehicle.status.is_bookable() {
            return Err(AppError::conflict(format!(
                "vehicle is {} and cannot be booked",
                vehicle.status
            )));
        }

        let booking = self
            .bookings
            .create_booking(CreateBookingParams {
                vehicle_id: command.vehicle_id,
                customer_id: command.customer_id,
                start_date: command.start_date,
                end_date: command.end_date,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => {
                    AppError::conflict("vehicle is already booked for these dates")
                }
                other => other.into(),
            })?;

        self.invalidate(&booking);
        Ok(booking)
    }

    pub async fn change_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<BookingRecord, AppError> {
        let current = self
            .bookings
            .find_booking(id)
            .await?
            .ok_or(AppError::NotFound)?;
        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(AppError::conflict(format!(
                "booking cannot move from {} to {status}",
                current.status
            )));
        }

        let booking = self.bookings.update_booking_status(id, status).await?;
        self.invalidate(&booking);
        Ok(booking)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let booking = self
            .bookings
            .find_booking(id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.bookings.delete_booking(id).await?;
        self.invalidate(&booking);
        Ok(())
    }

    fn invalidate(&self, booking: &BookingRecord) {
        self.invalidation.invalidate_booking_cache(
            Some(booking.id),
            Some(booking.customer_id),
            Some(booking.vehicle_id),
        );
    }
}

/// Read every booking, page by page.
pub(crate) async fn all_bookings(repo: &dyn BookingRepo) -> Result<Vec<BookingRecord>, RepoError> {
    let mut bookings = Vec::new();
    let mut page = 1;
    loop {
        let batch = repo
            .list_bookings(&BookingFilter {
                page: Some(page),
                per_page: Some(MAX_PER_PAGE),
                ..Default::default()
            })
            .await?;
        let fetched = batch.items.len();
        bookings.extend(batch.items);
        if fetched < MAX_PER_PAGE as usize || bookings.len() >= batch.total {
            return Ok(bookings);
        }
        page += 1;
    }
}
