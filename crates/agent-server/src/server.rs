use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;

use crate::config::GatewayConfig;
use crate::handlers;
use crate::state::AppState;

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::handler))
        .route("/ws", web::get().to(handlers::ws::handler));
}

pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr.clone();
    log::info!(
        "Initializing gateway with base URL: {}, model: {}",
        config.llm_base_url,
        config.model
    );
    if config.auth_token.is_none() {
        log::warn!("No auth token configured; any non-empty token is accepted");
    }

    let state = web::Data::new(AppState::new(config));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(app_config)
    })
    .bind(&listen_addr)
    .with_context(|| format!("failed to bind {listen_addr}"))?
    .run();

    log::info!("Listening on ws://{}/ws", listen_addr);
    server.await.context("gateway server error")?;
    log::info!("Gateway stopped");
    Ok(())
}
