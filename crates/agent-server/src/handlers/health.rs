use actix_web::{HttpResponse, Responder};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn handler() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse { status: "ok" })
}
