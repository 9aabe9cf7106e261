// client-gateway/src/identity.rs
//! Per-request handshake context and the identity-provider capability.

use actix_web::HttpRequest;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Callback route the provider redirects back to.
pub const RETURN_PATH: &str = "/api/auth/openid/return";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("authentication denied by provider")]
    Denied,
    #[error("identity protocol error: {0}")]
    Protocol(String),
}

/// Return address and trust realm for one handshake attempt.
///
/// Derived from the current request's origin on every call. Multiple public
/// hostnames may front the same process, so this must never be cached or
/// stored in process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeContext {
    pub realm: String,
    pub return_url: String,
}

impl HandshakeContext {
    pub fn from_request(req: &HttpRequest) -> Self {
        let info = req.connection_info();
        let origin = format!("{}://{}", info.scheme(), info.host());
        Self {
            return_url: format!("{}{}", origin, RETURN_PATH),
            realm: origin,
        }
    }
}

/// OpenID client capability consumed by the exchange bridge.
///
/// The protocol implementation lives behind this trait; the bridge only
/// supplies the per-request context and interprets the claimed identifier.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the provider redirect that starts the handshake.
    fn begin(&self, ctx: &HandshakeContext) -> Result<Url, IdentityError>;

    /// Verify the assertion carried by the callback query string, yielding
    /// the claimed identifier. Must use the same per-request context the
    /// handshake was initiated with.
    async fn verify(&self, ctx: &HandshakeContext, callback_query: &str)
        -> Result<String, IdentityError>;
}

/// Extract the opaque trailing id segment from a URL-shaped claimed
/// identifier, e.g. `https://provider.example/id/12345` yields `12345`.
pub fn external_id(claimed: &str) -> Option<String> {
    let url = Url::parse(claimed).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}
