mod config;
mod db;
mod inference;
mod notify;
mod pipeline;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use config::{AppConfig, HistoryBackend};
use db::dynamodb_repository::DynamoDbRepository;
use db::http_repository::HttpHistoryRepository;
use db::HistoryRepository;
use inference::http_client::HttpInferenceClient;
use inference::InferenceClient;
use notify::NotificationLog;
use pipeline::Orchestrator;
use routes::configure_routes;
use state::gallery::GalleryState;
use state::history::HistoryState;
use state::session::SessionState;
use storage::s3_service::S3Service;
use storage::AssetStore;

const NOTIFICATION_CAPACITY: usize = 50;

fn startup_error(message: String) -> std::io::Error {
    log::error!("{}", message);
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config =
        AppConfig::load().map_err(|e| startup_error(format!("Configuration error: {}", e)))?;

    // Initialize AWS configuration
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint) = &config.aws_endpoint_url {
        log::info!("Using AWS endpoint {}", endpoint);
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(key_id), Some(secret)) =
        (&config.aws_access_key_id, &config.aws_secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            key_id.clone(),
            secret.clone(),
            None,
            None,
            "tagger-config",
        ));
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.aws_endpoint_url.is_some())
        .build();
    let store: Arc<dyn AssetStore> = Arc::new(S3Service::new(
        S3Client::from_conf(s3_config),
        config.bucket.clone(),
        config.asset_prefix.clone(),
        config.public_base_url.clone(),
        config.presign_ttl(),
    ));

    let http = reqwest::Client::new();
    let inference_url = config
        .inference_url()
        .map_err(|e| startup_error(e.to_string()))?;
    let inference: Arc<dyn InferenceClient> = Arc::new(
        HttpInferenceClient::new(
            http.clone(),
            &inference_url,
            &config.inference_path,
            config.inference_timeout(),
            config.health_timeout(),
        )
        .map_err(|e| startup_error(format!("Invalid inference URL: {}", e)))?,
    );

    let history_repo: Arc<dyn HistoryRepository> = match config.history_backend {
        HistoryBackend::DynamoDb => {
            let table = config
                .history_table
                .clone()
                .ok_or_else(|| startup_error("DYNAMODB_HISTORY_TABLE is not set".to_string()))?;
            log::info!("History stored in DynamoDB table {}", table);
            Arc::new(DynamoDbRepository::new(DynamoDbClient::new(&aws_config), table))
        }
        HistoryBackend::Http => {
            let base = config
                .history_url()
                .map_err(|e| startup_error(e.to_string()))?;
            log::info!("History served by {}", base);
            Arc::new(
                HttpHistoryRepository::new(http.clone(), &base)
                    .map_err(|e| startup_error(format!("Invalid history URL: {}", e)))?,
            )
        }
    };

    let notifications = Arc::new(NotificationLog::new(NOTIFICATION_CAPACITY));
    let gallery = Arc::new(GalleryState::new(store.clone(), config.asset_prefix.clone()));
    let history = Arc::new(
        HistoryState::new(history_repo.clone(), config.history_limit)
            .with_asset_store(store.clone()),
    );
    let orchestrator = Orchestrator::new(
        store,
        inference.clone(),
        history_repo,
        gallery.clone(),
        history.clone(),
        Arc::new(SessionState::new()),
        notifications.clone(),
    )
    .with_max_upload_bytes(config.max_upload_bytes);

    let status = inference::probe_health(inference.as_ref()).await;
    log::info!(
        "Inference service at {} is {} (model: {})",
        inference_url,
        status.status,
        status.model_name.as_deref().unwrap_or("unknown")
    );
    // Both views are loaded before the first request is accepted.
    orchestrator.refresh_in_background(true);
    orchestrator.settle().await;

    let orchestrator = web::Data::new(orchestrator);
    let server_orchestrator = orchestrator.clone();
    let gallery = web::Data::from(gallery);
    let history = web::Data::from(history);
    let notifications = web::Data::from(notifications);
    let inference = web::Data::from(inference);
    let static_dir = config.static_dir.clone();
    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    // One worker serves every request, and the refreshes those requests
    // start are spawned onto that worker's scheduler.
    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(server_orchestrator.clone())
            .app_data(gallery.clone())
            .app_data(history.clone())
            .app_data(notifications.clone())
            .app_data(inference.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .workers(1)
    .bind(&bind_address)?
    .run()
    .await?;

    orchestrator.settle().await;
    log::info!("Server stopped");
    Ok(())
}
