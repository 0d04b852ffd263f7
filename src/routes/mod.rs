use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, auth, bookings, payments, vehicles};
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let customer_governor = create_role_governor(RateLimitedRole::Customer);
    let checkout_governor = create_role_governor(RateLimitedRole::Checkout);
    let public_governor = create_public_governor();

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    let session_routes = Router::new()
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/refresh", post(auth::refresh))
        .layer(customer_governor.clone())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Catalog, quotes and served cities need no account.
    let public_routes = Router::new()
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles/{id}", get(vehicles::get_vehicle))
        .route("/vehicles/{id}/quote", get(vehicles::quote))
        .route("/vehicles/{id}/availability", get(vehicles::check_availability))
        .route("/cities", get(vehicles::list_cities))
        .layer(public_governor);

    // Any signed-in user; ownership is checked per booking.
    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking).get(bookings::my_bookings))
        .route("/{id}", get(bookings::get_booking))
        .route("/{id}/cancel", post(bookings::cancel_booking))
        .route("/{id}/reschedule", post(bookings::reschedule_booking))
        .route("/{id}/receipt", get(bookings::booking_receipt))
        .layer(customer_governor)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let payment_routes = Router::new()
        .route("/api/bookings/{id}/payment", post(payments::initiate_payment))
        .route("/api/bookings/{id}/payment/confirm", post(payments::confirm_payment))
        .layer(checkout_governor)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes sit behind the global governor only.
    let admin_routes = Router::new()
        // Vehicle management
        .route("/vehicles", get(admin::list_vehicles).post(admin::create_vehicle))
        .route(
            "/vehicles/{id}",
            put(admin::update_vehicle).delete(admin::delete_vehicle),
        )
        .route("/vehicles/{id}/availability", put(admin::set_vehicle_availability))
        // User management
        .route("/users", get(admin::list_users))
        .route("/users/promote", post(admin::promote_user))
        .route("/users/{id}/role", put(admin::update_user_role))
        // Booking management
        .route("/bookings", get(admin::list_all_bookings))
        .route("/bookings/{id}", get(admin::get_booking))
        .route("/bookings/{id}/status", put(admin::update_booking_status))
        // Dashboard
        .route("/overview", get(admin::overview))
        .route("/analytics", get(admin::analytics_report))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes.merge(session_routes))
        .nest("/api", public_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/admin", admin_routes)
        .merge(payment_routes)
        .with_state(state)
}
