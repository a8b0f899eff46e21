use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use log::{error, info};

use ocean_catalog::api;
use ocean_catalog::app_state::AppState;
use ocean_catalog::config::AppConfig;
use ocean_catalog::logging;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    logging::init(&config.logging.config_file);

    let state = match AppState::from_config(config.clone()) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let server = &config.server;
    info!("Starting catalog server on {}:{} with {} workers", server.host, server.port, server.workers);

    HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .configure(|cfg| api::configure(cfg, &state))
    })
    .workers(server.workers)
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
