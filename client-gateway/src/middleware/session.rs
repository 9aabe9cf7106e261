// client-gateway/src/middleware/session.rs
//! Cookie-pair session authentication.
//!
//! A request is authenticated iff the `id` cookie names a user whose stored
//! session secret equals the `session` cookie. On any mismatch (including a
//! missing stored secret) both cookies are cleared on the response so the
//! client stops retrying a dead session.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, HttpRequest};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use common::models::user::{UserField, UserStore};

pub const ID_COOKIE: &str = "id";
pub const SESSION_COOKIE: &str = "session";

/// Request-extension state for an authenticated session.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub user_id: String,
}

/// The authenticated user id attached to this request, if any.
pub fn authenticated_user(req: &HttpRequest) -> Option<String> {
    req.extensions()
        .get::<AuthState>()
        .map(|state| state.user_id.clone())
}

pub struct SessionAuth {
    users: Arc<dyn UserStore>,
}

impl SessionAuth {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthMiddleware {
            service: Rc::new(service),
            users: Arc::clone(&self.users),
        }))
    }
}

pub struct SessionAuthMiddleware<S> {
    service: Rc<S>,
    users: Arc<dyn UserStore>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let users = Arc::clone(&self.users);

        Box::pin(async move {
            let clear_cookies = attach_auth_state(&req, users.as_ref()).await;
            let mut res = service.call(req).await?;
            if clear_cookies {
                // A handler may have set fresh cookies (login); leave those.
                let already_set: Vec<String> = res
                    .response()
                    .cookies()
                    .map(|cookie| cookie.name().to_string())
                    .collect();
                for name in [ID_COOKIE, SESSION_COOKIE] {
                    if already_set.iter().any(|set| set == name) {
                        continue;
                    }
                    let mut removal = Cookie::new(name, "");
                    removal.set_path("/");
                    if let Err(e) = res.response_mut().add_removal_cookie(&removal) {
                        tracing::warn!(cookie = name, error = %e, "could not clear cookie");
                    }
                }
            }
            Ok(res)
        })
    }
}

/// Attach `AuthState` when the cookie pair matches the stored secret.
/// Returns whether the cookies must be cleared. Runs at most once per
/// request: an already-attached state short-circuits.
async fn attach_auth_state(req: &ServiceRequest, users: &dyn UserStore) -> bool {
    if req.extensions().get::<AuthState>().is_some() {
        return false;
    }
    let Some(id_cookie) = req.cookie(ID_COOKIE) else {
        return false;
    };
    let user_id = id_cookie.value().to_string();

    let stored = match users.get(&user_id, UserField::SessionSecret).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "session secret lookup failed");
            return false;
        }
    };
    let presented = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

    match (stored, presented) {
        (Some(stored), Some(presented)) if stored == presented => {
            req.extensions_mut().insert(AuthState { user_id });
            false
        }
        _ => true,
    }
}
