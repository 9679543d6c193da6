use actix_web::{HttpResponse, get, web};
use pingboard_service::query::TimeRange;
use serde::Deserialize;

use super::endpoints::parse_id;
use crate::error::AppError;
use crate::owner::Owner;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksQuery {
    endpoint_id: Option<String>,
    range: Option<String>,
    limit: Option<usize>,
}

/// Measurement history for one endpoint, oldest first
#[get("/api/checks")]
pub async fn list_checks(
    owner: Owner,
    state: web::Data<AppState>,
    query: web::Query<ChecksQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let Some(endpoint_id) = query.endpoint_id.filter(|id| !id.is_empty()) else {
        return Err(AppError::BadRequest("endpointId is required".to_string()));
    };

    let range = TimeRange::parse_lossy(query.range.as_deref());
    let checks = state.endpoints.checks(owner.id(), parse_id(&endpoint_id)?, range, query.limit).await?;

    Ok(HttpResponse::Ok().json(checks))
}

#[get("/api/dashboard")]
pub async fn dashboard(owner: Owner, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let summary = state.endpoints.dashboard(owner.id()).await?;
    Ok(HttpResponse::Ok().json(summary))
}
