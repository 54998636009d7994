pub mod gateway;
pub mod routes;
pub mod store;
pub mod telemetry;
pub mod time;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use secrecy::{ExposeSecret, SecretBox};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::gateway::{IrisClient, SnapClient, WebhookSettings};
use crate::time::TimeSource;

/// Build the server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
pub async fn build(
    config: &mut Config,
    time_source: TimeSource,
) -> std::io::Result<Server> {
    let db_pool =
        web::Data::new(PgPool::connect(&config.database_url).await.unwrap());
    let time_source = web::Data::new(time_source);

    let snap_client = web::Data::new(SnapClient::new(
        SecretBox::new(Box::new(
            config.gateway_server_key.expose_secret().clone(),
        )),
        config.snap_base_url.clone(),
    ));
    let iris_client = web::Data::new(IrisClient::new(
        SecretBox::new(Box::new(
            config.iris_client_key.expose_secret().clone(),
        )),
        SecretBox::new(Box::new(
            config.iris_client_secret.expose_secret().clone(),
        )),
        config.iris_base_url.clone(),
    ));
    let webhook_settings = web::Data::new(WebhookSettings {
        server_key: SecretBox::new(Box::new(
            config.gateway_server_key.expose_secret().clone(),
        )),
        callback_token: config.callback_token.clone(),
    });

    // Clone config values for use in closure
    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        // Configure CORS based on allowed origins
        let cors = if allowed_origins.contains(&"*".to_string()) {
            // Allow any origin (for development)
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .supports_credentials()
        } else {
            // Production: Only allow specified origins
            let mut cors = Cors::default()
                .allow_any_method()
                .allow_any_header()
                .supports_credentials();

            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .wrap(cors)
            .service(routes::api_services())
            .app_data(db_pool.clone())
            .app_data(time_source.clone())
            .app_data(snap_client.clone())
            .app_data(iris_client.clone())
            .app_data(webhook_settings.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub struct Config {
    pub database_url: String,
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// List of allowed CORS origins. Use "*" to allow any origin (development only)
    pub allowed_origins: Vec<String>,
    /// Server key shared with the checkout gateway; signs webhook payloads.
    pub gateway_server_key: SecretBox<String>,
    pub snap_base_url: String,
    pub iris_base_url: String,
    /// Payout gateway credentials. Leave empty to skip disbursement calls.
    pub iris_client_key: SecretBox<String>,
    pub iris_client_secret: SecretBox<String>,
    /// Optional shared secret required in the X-Callback-Token header of
    /// webhook deliveries.
    pub callback_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        use std::env::var;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string()) // Default to allow any origin for development
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            database_url: var("DATABASE_URL").unwrap(),
            ip: var("IP_ADDRESS").unwrap(),
            port: var("PORT").unwrap().parse().unwrap(),
            allowed_origins,
            gateway_server_key: SecretBox::new(Box::new(
                var("GATEWAY_SERVER_KEY").unwrap(),
            )),
            snap_base_url: var("SNAP_BASE_URL").unwrap_or_else(|_| {
                "https://app.sandbox.midtrans.com/snap/v1/transactions".into()
            }),
            iris_base_url: var("IRIS_BASE_URL").unwrap_or_else(|_| {
                "https://app.sandbox.midtrans.com/iris/api/v1/payouts".into()
            }),
            iris_client_key: SecretBox::new(Box::new(
                var("IRIS_CLIENT_KEY").unwrap_or_default(),
            )),
            iris_client_secret: SecretBox::new(Box::new(
                var("IRIS_CLIENT_SECRET").unwrap_or_default(),
            )),
            callback_token: var("CALLBACK_TOKEN").ok(),
        }
    }
}
