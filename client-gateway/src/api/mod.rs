// client-gateway/src/api/mod.rs
pub mod auth;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api/auth/openid")
            .service(auth::begin)
            .route("/return", actix_web::web::route().to(auth::finish)),
    );
}
