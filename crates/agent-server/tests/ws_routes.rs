use actix_web::{http::StatusCode, test, web, App};

use agent_server::{app_config, AppState, GatewayConfig};

fn state() -> web::Data<AppState> {
    web::Data::new(AppState::new(GatewayConfig {
        auth_token: Some("s3cret".to_string()),
        ..GatewayConfig::default()
    }))
}

fn upgrade_request(uri: &str) -> test::TestRequest {
    test::TestRequest::get()
        .uri(uri)
        .insert_header(("upgrade", "websocket"))
        .insert_header(("connection", "Upgrade"))
        .insert_header(("sec-websocket-version", "13"))
        .insert_header(("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="))
}

#[actix_web::test]
async fn health_reports_ok() {
    let app = test::init_service(App::new().app_data(state()).configure(app_config)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn missing_token_is_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(app_config)).await;

    let resp = test::call_service(&app, upgrade_request("/ws").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = test::read_body(resp).await;
    assert_eq!(body, "missing token");
}

#[actix_web::test]
async fn wrong_token_is_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(app_config)).await;

    let resp = test::call_service(&app, upgrade_request("/ws?token=guess").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = test::read_body(resp).await;
    assert_eq!(body, "invalid token");
}

#[actix_web::test]
async fn valid_token_upgrades() {
    let app = test::init_service(App::new().app_data(state()).configure(app_config)).await;

    let resp = test::call_service(&app, upgrade_request("/ws?token=s3cret").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);

    let resp = test::call_service(
        &app,
        upgrade_request("/ws")
            .insert_header(("authorization", "Bearer s3cret"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);
}

#[actix_web::test]
async fn authorized_plain_get_is_not_a_handshake() {
    let app = test::init_service(App::new().app_data(state()).configure(app_config)).await;

    let req = test::TestRequest::get().uri("/ws?token=s3cret").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
