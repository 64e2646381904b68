use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use std::sync::Arc;
use std::time::Duration;
use talent_match::config::{LogFormat, Settings};
use talent_match::core::{MatchOrchestrator, RunExecutor};
use talent_match::routes::{self, matches::AppState};
use talent_match::services::{
    CachedScorer, DataGateway, InMemoryGateway, InMemoryStore, LocalLease, OpenAiScorer,
    PostgresClient, RedisLease, ResultStore, RunLease,
};
use tracing::{info, warn, error};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

fn io_error(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

fn init_tracing(settings: Option<&Settings>) {
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| settings.map(|s| s.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT")
        .ok()
        .or_else(|| settings.map(|s| s.logging.format.clone()))
        .unwrap_or_else(|| "json".to_string());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match LogFormat::from_name(&log_format) {
        LogFormat::Json => subscriber.json().with_current_span(true).init(),
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let loaded = Settings::load();
    init_tracing(loaded.as_ref().ok());

    info!("Starting talent matching service...");

    let settings = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        io_error(format!("Configuration error: {}", e))
    })?;

    info!("Configuration loaded successfully");

    // Data gateway and result store share one backend
    let (gateway, store): (Arc<dyn DataGateway>, Arc<dyn ResultStore>) = match &settings.database {
        Some(db) => {
            let postgres = Arc::new(
                PostgresClient::from_settings(
                    &db.url,
                    db.max_connections,
                    db.min_connections,
                    db.acquire_timeout_secs,
                    db.idle_timeout_secs,
                )
                .await
                .map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {}", e);
                    io_error(format!("PostgreSQL connection error: {}", e))
                })?,
            );
            info!("PostgreSQL client initialized");
            let gateway: Arc<dyn DataGateway> = postgres.clone();
            let store: Arc<dyn ResultStore> = postgres;
            (gateway, store)
        }
        None => {
            let gateway = match &settings.fixtures_path {
                Some(path) => InMemoryGateway::from_json_file(path).map_err(|e| {
                    error!("Failed to load fixtures: {}", e);
                    io_error(e.to_string())
                })?,
                None => InMemoryGateway::default(),
            };
            warn!("No database configured, using the in-memory backend");
            let gateway: Arc<dyn DataGateway> = Arc::new(gateway);
            let store: Arc<dyn ResultStore> = Arc::new(InMemoryStore::new());
            (gateway, store)
        }
    };

    let mut match_settings = settings.matching.to_match_settings();

    let api_key = settings.openai.api_key.clone().unwrap_or_default();
    if api_key.is_empty() && match_settings.qualitative_enabled {
        warn!("OPENAI_API_KEY is not set, qualitative scoring disabled");
        match_settings.qualitative_enabled = false;
    }

    let openai = OpenAiScorer::new(
        settings.openai.base_url.clone(),
        api_key,
        settings.openai.model.clone(),
        Duration::from_secs(settings.openai.request_timeout_secs),
    )
    .map_err(|e| io_error(format!("Failed to build OpenAI client: {}", e)))?;

    let scorer = Arc::new(CachedScorer::new(
        openai,
        settings.cache.max_capacity,
        Duration::from_secs(settings.cache.ttl_secs),
    ));

    info!(
        "Qualitative scorer initialized (model: {}, cache: {} entries, TTL: {}s)",
        settings.openai.model, settings.cache.max_capacity, settings.cache.ttl_secs
    );

    let lease_ttl = Duration::from_secs(settings.matching.lease_ttl_secs);
    let lease: Arc<dyn RunLease> = match &settings.lease.redis_url {
        Some(url) => match RedisLease::new(url, lease_ttl).await {
            Ok(lease) => {
                info!("Redis run lease initialized (TTL: {}s)", lease_ttl.as_secs());
                Arc::new(lease)
            }
            Err(e) => {
                error!("Failed to connect to Redis: {}", e);
                return Err(io_error(format!("Redis connection error: {}", e)));
            }
        },
        None => {
            info!("Using process-local run lease");
            Arc::new(LocalLease::new())
        }
    };

    let executor = Arc::new(RunExecutor::new(settings.matching.max_concurrent_runs));

    let orchestrator = MatchOrchestrator::new(
        gateway,
        scorer.clone(),
        store,
        lease,
        executor.clone(),
        match_settings,
    );

    info!("Orchestrator initialized with settings: {:?}", orchestrator.settings());

    let app_state = AppState { orchestrator };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let served = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    info!("HTTP server stopped, waiting for {} in-flight runs", executor.in_flight());
    executor.shutdown().await;

    let stats = scorer.stats().await;
    info!(
        "Qualitative cache: {} entries, {} hits, {} misses (hit rate {:.1}%)",
        stats.entries,
        stats.hits,
        stats.misses,
        stats.hit_rate * 100.0
    );

    served
}
