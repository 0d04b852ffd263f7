use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use vehicle_rental_backend::{
    config::Config,
    db,
    entities::user::{self, UserRole},
    handlers::auth::hash_password,
    middleware::rate_limit::{create_global_governor, log_request},
    routes, AppState,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vehicle_rental_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    seed_admin(&db, &config).await;

    if config.checkout.key_id.is_empty() {
        tracing::warn!("CHECKOUT_KEY_ID is not set, checkout sessions will carry an empty key");
    }

    let state = AppState {
        db: Arc::new(db),
        config: config.clone(),
    };

    let app = routes::create_router(state)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(create_global_governor());

    // Peer addresses feed the per-IP governors.
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

/// Create the configured admin account on first boot.
async fn seed_admin(db: &DatabaseConnection, config: &Config) {
    let admin_email = config.admin_email.trim().to_lowercase();

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&admin_email))
        .one(db)
        .await
        .expect("Failed to check for admin");

    if existing.is_some() {
        return;
    }

    let password_hash =
        hash_password(&config.admin_password).expect("Failed to hash admin password");

    let admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(admin_email.clone()),
        password_hash: Set(password_hash),
        name: Set("Admin".to_string()),
        phone: Set(None),
        role: Set(UserRole::Admin),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };

    admin.insert(db).await.expect("Failed to create admin");
    tracing::info!("Admin account created: {}", admin_email);
}
