use storefront_stock::{
    config::{database, settings},
    errors::Result,
    service::Storefront,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can be set externally too
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_settings = settings::load_default_settings()?;
    info!("Successfully processed application configuration.");

    // 4. Connect and make sure the schema exists
    let database_url = database::get_database_url(app_settings.database.url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed variant types from config.toml
    let storefront = Storefront::new(db, app_settings);
    storefront
        .seed_variant_types()
        .await
        .inspect_err(|e| error!("Failed to seed variant types: {}", e))?;

    let types = storefront.list_variant_types().await?;
    info!(
        variant_types = types.len(),
        cache = storefront.settings().cache.enabled,
        "Storefront engine ready"
    );
    Ok(())
}
