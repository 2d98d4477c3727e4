use app_state::AppSettings;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

/// Run migrations and get a database connection pool.
///
/// # Errors
///
/// * `PgPool::connect` can return an error if the database connection fails.
/// * `sqlx::migrate` can return an error if migrations fail.
pub async fn get_db_pool(
    settings: &AppSettings,
    run_migrations: bool,
) -> color_eyre::Result<Pool<Postgres>> {
    let db_settings = &settings.database;
    info!("Connecting to database.");
    let pool = PgPoolOptions::new()
        .max_connections(db_settings.max_connections)
        .min_connections(db_settings.min_connections)
        .max_lifetime(Duration::from_secs(db_settings.max_lifetime))
        .idle_timeout(Duration::from_secs(db_settings.idle_timeout))
        .acquire_timeout(Duration::from_secs(db_settings.acquire_timeout))
        .test_before_acquire(true)
        .connect(&settings.secrets.database_url)
        .await?;

    if run_migrations {
        info!("Running migrations.");
        sqlx::migrate!("../../../migrations").run(&pool).await?;
    }

    Ok(pool)
}
