use art_marketplace_api::{
    dto::auth::RegisterRequest, middleware::validation::ValidatedJson,
    routes::health::health_check,
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::{get, post},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
}

#[tokio::test]
async fn health_route_serves_json_envelope() {
    let app = Router::new().route("/health", get(health_check));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Health check");
    assert_eq!(body["data"]["status"], "ok");
}

fn register_app() -> Router {
    Router::new().route(
        "/register",
        post(|ValidatedJson(payload): ValidatedJson<RegisterRequest>| async move {
            payload.email
        }),
    )
}

fn post_json(body: &str) -> Request<Body> {
    Request::post("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn invalid_payload_lists_field_errors() {
    let response = register_app()
        .oneshot(post_json(
            r#"{"email":"not-an-email","password":"short","full_name":"Ann"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    let fields = &body["data"]["fields"];
    assert!(fields["email"].is_array());
    assert!(fields["password"].is_array());
    assert!(fields.get("full_name").is_none());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let response = register_app()
        .oneshot(post_json(r#"{"email":"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
