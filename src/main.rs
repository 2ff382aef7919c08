use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use secure_file_store::config::AppConfig;
use secure_file_store::routes::routes::routes;
use secure_file_store::services::blob_store::{BlobStore, FsBlobStore};
use secure_file_store::services::key_service::EnvelopeKeyService;
use secure_file_store::services::metadata_repository::SqliteMetadataRepository;
use secure_file_store::services::secrets::{
    FileParameterProvider, KEY_ID_PARAMETER, MASTER_KEY_PARAMETER, SecretProvider,
};
use secure_file_store::services::storage_service::FileStorageService;
use secure_file_store::services::user_repository::SqliteUserRepository;
use secure_file_store::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting secure-file-store with config: {:?}", cfg);

    // --- Ensure storage directories exist ---
    for dir in [&cfg.storage_dir, &cfg.spool_dir] {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory at {}", dir);
        }
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    // SQLx will not create the database file on its own
    match fs::OpenOptions::new().create(true).write(true).open(db_path) {
        Ok(_) => tracing::debug!("Database file can be created/opened successfully."),
        Err(e) => tracing::warn!("Failed to open database file manually: {}", e),
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Resolve key material; the service cannot become ready without it ---
    let parameters = FileParameterProvider::new(&cfg.parameters_path);
    let key_id = parameters
        .get_parameter(KEY_ID_PARAMETER)
        .await
        .context("resolving the active encryption key id")?;
    let master_hex = parameters
        .get_parameter(MASTER_KEY_PARAMETER)
        .await
        .context("resolving the key-service master secret")?;
    let key_service = EnvelopeKeyService::from_hex(&master_hex)
        .context("parsing the key-service master secret")?;
    tracing::info!("Resolved active encryption key id.");

    // --- Initialize core services ---
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(cfg.storage_dir.clone()));
    let metadata = Arc::new(SqliteMetadataRepository::new(db.clone()));
    let storage = FileStorageService::new(
        Arc::new(key_service),
        blob_store.clone(),
        metadata,
        cfg.bucket_name.clone(),
        key_id,
        cfg.spool_dir.clone(),
    );
    let users = SqliteUserRepository::new(db.clone());

    // --- Build router ---
    let app = routes(AppState {
        storage,
        users,
        db,
        blob_store,
        bucket: cfg.bucket_name.clone(),
    });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations manually from the embedded SQL file.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let path = "migrations/0001_init.sql";

    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
