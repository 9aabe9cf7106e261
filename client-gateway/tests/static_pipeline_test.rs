// client-gateway/tests/static_pipeline_test.rs
mod support;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};

use client_gateway::middleware::tokens_suppressed;
use support::{fixture_runtime, StubProvider, PACKAGE_HTTP_DATE, PNG_BYTES};

macro_rules! gateway_app {
    () => {{
        let (runtime, _store) = fixture_runtime(StubProvider::default());
        test::init_service(
            App::new()
                .configure(|cfg| client_gateway::register(cfg, runtime))
                .default_service(web::route().to(support::whoami)),
        )
        .await
    }};
}

#[actix_web::test]
async fn root_serves_transformed_index() {
    let app = gateway_app!();

    let req = test::TestRequest::get().uri("/").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html"
    );
    assert_eq!(
        res.headers().get(header::LAST_MODIFIED).unwrap(),
        PACKAGE_HTTP_DATE
    );
    assert!(tokens_suppressed(res.request()));

    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains("localStorage.prevAuth = localStorage.auth;"));
    assert!(body.contains("<title>Game</title>"));
    assert!(!body.contains("xsolla"));
    assert!(!body.contains("facebook"));
    assert!(!body.contains("google"));
    assert!(body.contains("fbq = new Proxy"));
}

#[actix_web::test]
async fn conditional_request_round_trips_to_not_modified() {
    let app = gateway_app!();

    let req = test::TestRequest::get().uri("/index.html").to_request();
    let res = test::call_service(&app, req).await;
    let last_modified = res
        .headers()
        .get(header::LAST_MODIFIED)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let req = test::TestRequest::get()
        .uri("/index.html")
        .insert_header((header::IF_MODIFIED_SINCE, last_modified))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    assert!(test::read_body(res).await.is_empty());
}

#[actix_web::test]
async fn freshness_is_compared_at_minute_granularity() {
    let app = gateway_app!();

    // 59 seconds into the archive's minute still floors to it: fresh.
    let req = test::TestRequest::get()
        .uri("/index.html")
        .insert_header((header::IF_MODIFIED_SINCE, "Mon, 01 Jan 2024 00:00:59 GMT"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);

    // One second before the archive's minute: stale, full response.
    let req = test::TestRequest::get()
        .uri("/index.html")
        .insert_header((header::IF_MODIFIED_SINCE, "Sun, 31 Dec 2023 23:59:59 GMT"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn malformed_conditional_header_gets_a_full_response() {
    let app = gateway_app!();

    let req = test::TestRequest::get()
        .uri("/index.html")
        .insert_header((header::IF_MODIFIED_SINCE, "last tuesday"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn cache_busted_assets_are_cached_forever() {
    let app = gateway_app!();

    let req = test::TestRequest::get()
        .uri("/build.min.js?bust=20240101")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CACHE_CONTROL).unwrap(),
        "public,max-age=31536000,immutable"
    );

    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert_eq!(body, "load('/assets/img/icon.png');");

    let req = test::TestRequest::get().uri("/build.min.js").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.headers().get(header::CACHE_CONTROL).is_none());
}

#[actix_web::test]
async fn config_js_points_at_local_routes() {
    let app = gateway_app!();

    let req = test::TestRequest::get().uri("/config.js").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/javascript"
    );

    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains("API_URL = '/api/'"));
    assert!(body.contains("WEBSOCKET_URL = '/socket/'"));
    assert!(!body.contains("cdn.example"));
}

#[actix_web::test]
async fn binary_assets_pass_through_with_their_mime_type() {
    let app = gateway_app!();

    let req = test::TestRequest::get().uri("/assets/icon.png").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(test::read_body(res).await.as_ref(), PNG_BYTES);
}

#[actix_web::test]
async fn unmatched_paths_fall_through_to_the_next_handler() {
    let app = gateway_app!();

    let req = test::TestRequest::get().uri("/missing.js").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!tokens_suppressed(res.request()));
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
}

#[actix_web::test]
async fn missing_archive_disables_static_serving_only() {
    let (mut runtime, _store) = fixture_runtime(StubProvider::default());
    runtime.archive = None;
    let app = test::init_service(
        App::new()
            .configure(|cfg| client_gateway::register(cfg, runtime))
            .default_service(web::route().to(support::whoami)),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    // Auth routes keep working without the archive.
    let req = test::TestRequest::get().uri("/api/auth/openid").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FOUND);
}
