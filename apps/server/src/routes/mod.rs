use actix_web::{error, web};

use crate::error::AppError;

mod checks;
mod cron;
mod endpoints;
mod health;

/// Register every route plus JSON and query extractor configs that report
/// malformed input as a 400 with a JSON body
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| error::Error::from(AppError::BadRequest(err.to_string()))),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| error::Error::from(AppError::BadRequest(err.to_string()))),
    )
    .service(health::health_route)
    .service(cron::run_checks)
    .service(endpoints::list_endpoints)
    .service(endpoints::create_endpoint)
    .service(endpoints::get_endpoint)
    .service(endpoints::update_endpoint)
    .service(endpoints::delete_endpoint)
    .service(endpoints::ping_endpoint)
    .service(endpoints::endpoint_stats)
    .service(checks::list_checks)
    .service(checks::dashboard);
}
