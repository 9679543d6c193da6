use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpRequest, HttpResponse, post, web};
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

const CRON_SECRET_HEADER: &str = "x-cron-secret";

fn header_str<'a>(req: &'a HttpRequest, name: impl actix_web::http::header::AsHeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.bytes().zip(b.bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

/// Either `Authorization: Bearer <secret>` or `x-cron-secret: <secret>` is enough
fn is_authorized(req: &HttpRequest, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };

    let bearer = header_str(req, AUTHORIZATION)
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|given| constant_time_eq(given, secret));
    let header = header_str(req, CRON_SECRET_HEADER).is_some_and(|given| constant_time_eq(given, secret));

    bearer | header
}

/// External tick trigger. Authorization is checked before any scheduling work.
#[post("/api/cron/run-checks")]
pub async fn run_checks(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if !is_authorized(&req, state.cron_secret.as_deref()) {
        warn!(peer = ?req.peer_addr(), "Rejected tick trigger");
        return Err(AppError::Unauthorized);
    }

    let summary = state.ticks.run_tick().await?;
    Ok(HttpResponse::Ok().json(summary))
}
