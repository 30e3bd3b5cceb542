//! Application services: validation, cache-aside reads and invalidation on writes.

pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod error;
pub mod maintenance;
pub mod recurring;
pub mod repos;
pub mod vehicles;
