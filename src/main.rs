use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::PgNotificationChannel;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();

    // Initialize the global logger with the configured log level
    Logger::init_logger(&config);

    info!("Starting relay chat server...");

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    // One listener connection per process; every streaming session gets a
    // private cursor over this shared channel.
    let channel = Arc::new(PgNotificationChannel::new(config.database_url()));

    let app_state = AppState::new(config, &db, channel);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed to start: {e}");
        std::process::exit(1);
    }
}
