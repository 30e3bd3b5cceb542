pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    let admin = Router::new()
        .route("/api/v1/admin/cache", delete(handlers::clear_cache))
        .route("/api/v1/admin/cache/stats", get(handlers::cache_stats))
        .route("/api/v1/admin/cache/purge", post(handlers::purge_cache))
        .route("/api/v1/admin/cache/sweep", post(handlers::sweep_cache))
        .route_layer(axum_middleware::from_fn(middleware::require_admin));

    Router::new()
        .route(
            "/api/v1/vehicles",
            get(handlers::list_vehicles).post(handlers::create_vehicle),
        )
        .route(
            "/api/v1/vehicles/{id}",
            get(handlers::get_vehicle)
                .patch(handlers::update_vehicle)
                .delete(handlers::delete_vehicle),
        )
        .route(
            "/api/v1/bookings",
            get(handlers::list_bookings).post(handlers::create_booking),
        )
        .route(
            "/api/v1/bookings/{id}",
            get(handlers::get_booking).delete(handlers::delete_booking),
        )
        .route(
            "/api/v1/bookings/{id}/status",
            post(handlers::update_booking_status),
        )
        .route("/api/v1/dashboard", get(handlers::dashboard))
        .route(
            "/api/v1/recurring-expenses",
            get(handlers::list_recurring_expenses).post(handlers::create_recurring_expense),
        )
        .route(
            "/api/v1/recurring-expenses/process",
            post(handlers::process_recurring_expenses),
        )
        .route("/api/v1/maintenance", post(handlers::create_maintenance_plan))
        .route("/api/v1/maintenance/due", get(handlers::maintenance_due))
        .route(
            "/api/v1/maintenance/{id}/complete",
            post(handlers::complete_maintenance),
        )
        .merge(admin)
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ))
}
