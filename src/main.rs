use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use std::io;
use std::sync::Arc;

use tasklane::config::Config;
use tasklane::mail::{BrevoClient, MailNotifier};
use tasklane::routes;
use tasklane::state::AppState;
use tasklane::store::{MemoryStore, PgStore, Store};
use tasklane::uploads::{CloudinaryUploader, FileUploader, LocalUploader};

fn startup_error(context: &str, error: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, error))
}

async fn open_store(config: &Config) -> io::Result<Arc<dyn Store>> {
    if config.uses_memory_store() {
        log::warn!("Using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgStore::connect(&config.database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;
    if config.run_migrations {
        store
            .migrate()
            .await
            .map_err(|e| startup_error("Failed to run migrations", e))?;
        log::info!("Database migrations applied");
    }
    Ok(Arc::new(store))
}

fn uploader(config: &Config) -> io::Result<Arc<dyn FileUploader>> {
    match &config.cloudinary {
        Some(cloudinary) => {
            log::info!("Storing attachments in Cloudinary cloud {}", cloudinary.cloud_name);
            let uploader = CloudinaryUploader::new(cloudinary.clone())
                .map_err(|e| startup_error("Failed to build Cloudinary client", e))?;
            Ok(Arc::new(uploader))
        }
        None => {
            log::info!("Storing attachments under {}", config.upload_dir.display());
            Ok(Arc::new(LocalUploader::new(config.upload_dir.clone())))
        }
    }
}

fn mailer(config: &Config, store: Arc<dyn Store>) -> io::Result<MailNotifier> {
    let client = match &config.mail {
        Some(mail) => Some(
            BrevoClient::new(mail).map_err(|e| startup_error("Failed to build Brevo client", e))?,
        ),
        None => {
            log::warn!("BREVO_API_KEY is not set; signup mail is disabled");
            None
        }
    };
    Ok(MailNotifier::new(store, client))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    let store = open_store(&config).await?;
    let mailer = mailer(&config, store.clone())?;
    let state = web::Data::new(AppState::new(&config, store, mailer, uploader(&config)?));
    state
        .bootstrap(&config)
        .await
        .map_err(|e| startup_error("Failed to set up the admin account", e))?;

    log::info!("Starting tasklane server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
