use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub spool_dir: String,
    pub database_url: String,
    pub bucket_name: String,
    pub parameters_path: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted file storage API")]
pub struct Args {
    /// Host to bind to (overrides FILE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where encrypted blobs are stored (overrides FILE_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Scratch directory for spooled downloads (overrides FILE_STORE_SPOOL_DIR)
    #[arg(long)]
    pub spool_dir: Option<String>,

    /// Database URL (overrides FILE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Blob-store bucket this deployment serves (overrides FILE_STORE_BUCKET)
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// Path to the JSON parameters document (overrides FILE_STORE_PARAMETERS_PATH)
    #[arg(long)]
    pub parameters_path: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILE_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("FILE_STORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_STORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading FILE_STORE_PORT"),
        };
        let env_storage =
            env::var("FILE_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_spool = env::var("FILE_STORE_SPOOL_DIR").unwrap_or_else(|_| "./data/spool".into());
        let env_db = env::var("FILE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/file_store.db".into());
        let env_bucket =
            env::var("FILE_STORE_BUCKET").unwrap_or_else(|_| "secure-file-store".into());
        let env_parameters = env::var("FILE_STORE_PARAMETERS_PATH")
            .unwrap_or_else(|_| "./config/parameters.json".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            spool_dir: args.spool_dir.unwrap_or(env_spool),
            database_url: args.database_url.unwrap_or(env_db),
            bucket_name: args.bucket_name.unwrap_or(env_bucket),
            parameters_path: args.parameters_path.unwrap_or(env_parameters),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
