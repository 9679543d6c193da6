use actix_web::{HttpResponse, delete, get, patch, post, web};
use pingboard_service::database::models::Measurement;
use pingboard_service::endpoints::{EndpointDraft, EndpointPatch};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::owner::Owner;
use crate::state::AppState;

/// Ids that do not parse cannot belong to anyone
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

#[get("/api/endpoints")]
pub async fn list_endpoints(owner: Owner, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let endpoints = state.endpoints.list(owner.id()).await?;
    Ok(HttpResponse::Ok().json(endpoints))
}

#[post("/api/endpoints")]
pub async fn create_endpoint(
    owner: Owner,
    state: web::Data<AppState>,
    draft: web::Json<EndpointDraft>,
) -> Result<HttpResponse, AppError> {
    let endpoint = state.endpoints.create(owner.id(), draft.into_inner()).await?;
    Ok(HttpResponse::Created().json(endpoint))
}

#[get("/api/endpoints/{id}")]
pub async fn get_endpoint(
    owner: Owner,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let detail = state.endpoints.get(owner.id(), parse_id(&id)?).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[patch("/api/endpoints/{id}")]
pub async fn update_endpoint(
    owner: Owner,
    state: web::Data<AppState>,
    id: web::Path<String>,
    patch: web::Json<EndpointPatch>,
) -> Result<HttpResponse, AppError> {
    let endpoint = state.endpoints.update(owner.id(), parse_id(&id)?, patch.into_inner()).await?;
    Ok(HttpResponse::Ok().json(endpoint))
}

#[delete("/api/endpoints/{id}")]
pub async fn delete_endpoint(
    owner: Owner,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    state.endpoints.delete(owner.id(), parse_id(&id)?).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PingResponse {
    #[serde(flatten)]
    measurement: Measurement,
    /// Measured round trip, reported even when no status was received
    latency: u64,
}

/// Manual check, independent of due-ness and the paused flag
#[post("/api/endpoints/{id}/ping")]
pub async fn ping_endpoint(
    owner: Owner,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let check = state.endpoints.ping(owner.id(), parse_id(&id)?).await?;
    Ok(HttpResponse::Ok().json(PingResponse { latency: check.outcome.latency_ms, measurement: check.measurement }))
}

#[get("/api/endpoints/{id}/stats")]
pub async fn endpoint_stats(
    owner: Owner,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let stats = state.endpoints.stats(owner.id(), parse_id(&id)?).await?;
    Ok(HttpResponse::Ok().json(stats))
}
