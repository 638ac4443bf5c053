use resume_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    media::Buckets,
    repository::{PostgresRepository, RepositoryState},
    session::{SessionProviderState, SupabaseAuthProvider},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects Postgres, object storage and the auth
/// provider, then serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise local debugging defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "resume_portal=debug,tower_http=info,axum=trace".into());

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

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Object storage (MinIO locally, Supabase Storage S3 gateway in production)
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.storage_public_url,
    )
    .await;

    // LOCAL-ONLY: create the MinIO buckets on first start.
    if config.env == Env::Local {
        let buckets = Buckets::from_config(&config);
        for bucket in buckets.all() {
            s3_client.ensure_bucket_exists(bucket).await;
        }
    }
    let storage = Arc::new(s3_client) as StorageState;

    // 5. Auth provider
    let auth = Arc::new(SupabaseAuthProvider::new(
        &config.supabase_url,
        &config.supabase_anon_key,
        &config.username_domain,
    )) as SessionProviderState;

    // 6. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, storage, auth, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind {}: {}", bind_addr, e));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}
