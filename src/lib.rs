#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use bson::doc;
use mongodb::{Client, Database};
use rocket::data::{Limits, ToByteUnit};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use std::process::exit;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;
use crate::security::Security;
use crate::storage::UploadStore;

pub mod access;
pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod storage;
pub mod util;

/// Multipart overhead allowed on top of the file itself.
const FORM_OVERHEAD: u64 = 64 * 1024;

fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global logger: {}", err);
    }

    if let Err(err) = tracing_log::LogTracer::init() {
        tracing::warn!("Unable to forward log records: {}", err);
    }
}

fn load_config() -> Result<Config, ConfigurationError> {
    match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            Ok(c)
        }
        Err(ConfigurationError::NotFound(dir)) => {
            tracing::info!("No configuration in '{}', using defaults.", dir.display());
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            Ok(c)
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            Err(other)
        }
    }
}

pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        init_logging(l);
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = load_config()?;

    tracing::info!("Initializing security information...");
    let security = Security::load()?;

    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    if let Err(err) = db.run_command(doc! { "ping": 1 }, None).await {
        tracing::error!("Unable to connect to MongoDB: {}", err);
        exit(1)
    }

    data::ensure_indexes(&db).await?;

    build_rocket(c, security, db)
}

/// Assembles the server around already prepared state.
pub fn build_rocket(
    c: Config,
    security: Security,
    db: Database,
) -> Result<Rocket<Build>, BackendError> {
    let uploads = UploadStore::new(&c.upload_dir, c.max_upload_size);
    uploads.ensure_dir()?;

    let limits = Limits::default()
        .limit("file", c.max_upload_size.bytes())
        .limit("data-form", (c.max_upload_size + FORM_OVERHEAD).bytes());
    let figment = rocket::Config::figment().merge(("limits", limits));

    tracing::info!("Setting up CORS...");
    let allowed_origins = if c.allowed_origins.is_empty() {
        AllowedOrigins::All
    } else {
        AllowedOrigins::some_exact(&c.allowed_origins)
    };

    let cors = rocket_cors::CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    tracing::info!("Starting HTTP server...");
    let r = rocket::custom(figment)
        .manage(c)
        .manage(security)
        .manage(db)
        .manage(uploads)
        .attach(cors);

    Ok(mount_api(r))
}
