use raven_admin::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    lookup::{HttpCaLookup, LookupState},
    repository::{PostgresRepository, RepositoryState},
    seed,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database and migrations, the CA lookup client,
/// the optional administrator bootstrap, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "raven_admin=debug,tower_http=info,tower_sessions=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database (Postgres) and schema
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Outbound CA lookup
    let lookup = HttpCaLookup::new(&config.ca_lookup_url)
        .expect("FATAL: Failed to build the CA lookup HTTP client.");
    let lookup = Arc::new(lookup) as LookupState;

    // 5. First administrator, if requested and none exists yet
    match seed::bootstrap_admin(repo.as_ref(), &config).await {
        Ok(Some(user_id)) => tracing::info!(user_id, "bootstrap administrator ready"),
        Ok(None) => {}
        Err(e) => tracing::error!("administrator bootstrap failed: {}", e),
    }

    // 6. Router and server
    let port = config.port;
    let app = create_router(AppState::new(repo, lookup, config));

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on 0.0.0.0:{}", port);
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui", port);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
