#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;

use actix_web::{App, HttpServer, web};
use pingboard_service::Config;
use tracing::{info, warn};

mod error;
mod owner;
mod routes;
mod state;

use error::AppError;
use state::AppState;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logger::init();

    let config = Config::from_config(env::var_os("PINGBOARD_CONFIG"))?;
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    let state = web::Data::new(AppState::open(&config).await?);
    if state.cron_secret.is_none() {
        warn!("No cron secret configured, the tick trigger will reject every request");
    }

    run_server(addr, state).await
}

async fn run_server(addr: SocketAddr, state: web::Data<AppState>) -> Result<(), AppError> {
    info!(%addr, "Listening");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
