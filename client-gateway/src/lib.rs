// client-gateway/src/lib.rs
//! Serves the packaged browser client out of an in-memory archive and
//! bridges first-login to an external OpenID identity provider.
//!
//! The crate is attached to a host application through [`register`]; it has
//! no opinion on how the host builds its server. Capabilities (archive,
//! user store, identity provider) are supplied via [`GatewayRuntime`].

pub mod api;
pub mod archive;
pub mod identity;
pub mod middleware;
pub mod transform;

use std::sync::Arc;

use actix_web::web;

use common::models::user::UserStore;
use common::Config;

use archive::ClientArchive;
use identity::IdentityProvider;
use middleware::{SessionAuth, StaticAssets};

/// Capabilities the gateway runs against.
#[derive(Clone)]
pub struct GatewayRuntime {
    /// `None` disables static serving; all other routes keep working.
    pub archive: Option<Arc<ClientArchive>>,
    pub users: Arc<dyn UserStore>,
    pub provider: Arc<dyn IdentityProvider>,
}

impl GatewayRuntime {
    pub fn new(
        archive: Option<Arc<ClientArchive>>,
        users: Arc<dyn UserStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            archive,
            users,
            provider,
        }
    }

    /// Load the client archive per configuration. A missing or unreadable
    /// package disables static serving instead of failing.
    pub fn from_config(
        config: &Config,
        users: Arc<dyn UserStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let archive = match config.client.package_path() {
            Some(path) => match ClientArchive::load(&path) {
                Ok(archive) => {
                    tracing::info!(path = %path.display(), "client package loaded");
                    Some(Arc::new(archive))
                }
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "client package unreadable; static serving disabled"
                    );
                    None
                }
            },
            None => {
                tracing::warn!("no client package configured; static serving disabled");
                None
            }
        };
        Self::new(archive, users, provider)
    }
}

/// Mount the gateway onto a host service configuration.
///
/// Requests hit the archive pipeline first; misses fall through to the
/// session authenticator and then to the auth routes.
pub fn register(cfg: &mut web::ServiceConfig, runtime: GatewayRuntime) {
    cfg.service(
        web::scope("")
            .app_data(web::Data::new(runtime.clone()))
            // Last `wrap` is outermost: static assets short-circuit ahead
            // of the session check.
            .wrap(SessionAuth::new(Arc::clone(&runtime.users)))
            .wrap(StaticAssets::new(runtime.archive.clone()))
            .configure(api::configure),
    );
}
