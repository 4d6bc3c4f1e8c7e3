use std::sync::Arc;

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::connection::{Connection, ConnectionSettings};
use crate::state::AppState;
use crate::writer::WsOutbound;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    token: Option<String>,
}

/// `GET /ws?token=...`. The token may also arrive as a bearer header.
pub async fn handler(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<ConnectQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = query.token.as_deref().or_else(|| bearer_token(&req));
    if let Err(error) = state.authorize(token) {
        log::warn!(
            "Rejected connection from {}: {}",
            peer(&req),
            error
        );
        return Ok(HttpResponse::Unauthorized().body(error.to_string()));
    }

    let (response, session, inbound) = actix_ws::handle(&req, body)?;
    log::info!("Accepted connection from {}", peer(&req));

    let outbound = Arc::new(WsOutbound::new(session));
    let connection = Connection::new(state.orchestrator(), state.new_session(), outbound);
    let settings = ConnectionSettings::from_config(&state.config);
    actix_web::rt::spawn(connection.serve(inbound, settings));

    Ok(response)
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn peer(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_header_is_read() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }
}
