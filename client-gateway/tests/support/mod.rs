// client-gateway/tests/support/mod.rs
#![allow(dead_code)]
//! Shared fixtures: a synthetic client package, a stub identity provider,
//! and a seeded user store.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use url::Url;

use client_gateway::archive::ClientArchive;
use client_gateway::identity::{HandshakeContext, IdentityError, IdentityProvider};
use client_gateway::middleware::authenticated_user;
use client_gateway::GatewayRuntime;
use common::models::user::MemoryUserStore;

/// 2024-01-01 00:00:30 UTC; floors to 00:00:00.
pub const PACKAGE_MTIME_SECS: u64 = 1_704_067_230;
/// `Last-Modified` the gateway should emit for the fixture package.
pub const PACKAGE_HTTP_DATE: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

pub const CLAIMED_ID: &str = "https://provider.example/id/12345";

pub const INDEX_HTML: &str = concat!(
    "<html><head><title>Game</title>",
    "<script>window.xsolla = 'pay';</script>",
    "<script>/* connect.facebook.net */ fbq('init');</script>",
    "<script>/* google analytics */ ga('send');</script>",
    "</head><body></body></html>",
);

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Identity provider stub: encodes the per-request context into the
/// redirect and returns a fixed claimed identifier unless the callback
/// carries a denial marker.
pub struct StubProvider {
    pub claimed_id: String,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self {
            claimed_id: CLAIMED_ID.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn begin(&self, ctx: &HandshakeContext) -> Result<Url, IdentityError> {
        let mut url = Url::parse("https://provider.example/login")
            .map_err(|e| IdentityError::Protocol(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("openid.return_to", &ctx.return_url)
            .append_pair("openid.realm", &ctx.realm);
        Ok(url)
    }

    async fn verify(
        &self,
        _ctx: &HandshakeContext,
        callback_query: &str,
    ) -> Result<String, IdentityError> {
        if callback_query.contains("denied") {
            return Err(IdentityError::Denied);
        }
        Ok(self.claimed_id.clone())
    }
}

/// Build a stored-only Zip32 archive in memory.
pub fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    const SIG_LFH: u32 = 0x0403_4b50;
    const SIG_CDFH: u32 = 0x0201_4b50;
    const SIG_EOCD: u32 = 0x0605_4b50;

    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, raw) in files {
        let crc = {
            let mut c = flate2::Crc::new();
            c.update(raw);
            c.sum()
        };
        let lfh_off = out.len() as u32;

        out.extend_from_slice(&SIG_LFH.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(raw);

        central.extend_from_slice(&SIG_CDFH.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes()); // stored
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        central.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&lfh_off.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let cd_off = out.len() as u32;
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(&SIG_EOCD.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_off.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

pub fn fixture_archive() -> ClientArchive {
    let zip = build_zip(&[
        ("index.html", INDEX_HTML.as_bytes()),
        ("config.js", b"var CONFIG = { API_URL: 'https://cdn.example/api/' };"),
        (
            "build.min.js",
            b"load('https://d3os7yery2usni.cloudfront.net/img/icon.png');",
        ),
        ("assets/icon.png", PNG_BYTES),
    ]);
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(PACKAGE_MTIME_SECS);
    ClientArchive::from_vec(zip, mtime).expect("fixture archive parses")
}

/// Runtime with a seeded store: user `u42`/`alice` linked to external id
/// `12345`.
pub fn fixture_runtime(provider: StubProvider) -> (GatewayRuntime, Arc<MemoryUserStore>) {
    let store = Arc::new(MemoryUserStore::new());
    store.insert_user("u42", "alice");
    store.link_external_id("12345", "u42");

    let runtime = GatewayRuntime::new(
        Some(Arc::new(fixture_archive())),
        store.clone(),
        Arc::new(provider),
    );
    (runtime, store)
}

/// App-level fallback handler standing in for the host's remaining routes.
pub async fn whoami(req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "user": authenticated_user(&req),
    }))
}
