// client-gateway/src/api/auth.rs
//! Identity exchange bridge: redirect handshake with the external provider.
//!
//! Initiation and return both derive their context from the current
//! request's origin, so concurrent handshakes behind different public
//! hostnames each see their own return address.

use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{get, web, HttpRequest, HttpResponse};

use common::utils::generate_session_secret;
use common::models::user::UserField;

use crate::identity::{self, HandshakeContext};
use crate::middleware::session::{ID_COOKIE, SESSION_COOKIE};
use crate::GatewayRuntime;

/// Start the handshake: redirect the browser to the identity provider.
#[get("")]
pub async fn begin(req: HttpRequest, runtime: web::Data<GatewayRuntime>) -> HttpResponse {
    let ctx = HandshakeContext::from_request(&req);
    match runtime.provider.begin(&ctx) {
        Ok(url) => HttpResponse::Found()
            .insert_header((header::LOCATION, url.to_string()))
            .finish(),
        Err(e) => {
            tracing::warn!(realm = %ctx.realm, error = %e, "could not start identity handshake");
            redirect_home()
        }
    }
}

/// Complete the handshake: verify the assertion, rotate the session secret,
/// and relay the result to the window that opened the flow.
pub async fn finish(req: HttpRequest, runtime: web::Data<GatewayRuntime>) -> HttpResponse {
    let ctx = HandshakeContext::from_request(&req);

    let claimed = match runtime.provider.verify(&ctx, req.query_string()).await {
        Ok(claimed) => claimed,
        Err(e) => {
            tracing::warn!(realm = %ctx.realm, error = %e, "identity verification failed");
            return redirect_home();
        }
    };
    let Some(external_id) = identity::external_id(&claimed) else {
        tracing::warn!(claimed = %claimed, "claimed identifier has no id segment");
        return redirect_home();
    };

    let user_id = match runtime.users.resolve_external_id(&external_id).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            tracing::warn!(external_id = %external_id, "external identity not resolvable");
            return redirect_home();
        }
        Err(e) => {
            tracing::warn!(external_id = %external_id, error = %e, "user store lookup failed");
            return redirect_home();
        }
    };

    let secret = generate_session_secret();
    if let Err(e) = runtime
        .users
        .set(&user_id, UserField::SessionSecret, &secret)
        .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "session secret rotation failed");
        return redirect_home();
    }
    let username = match runtime.users.get(&user_id, UserField::Username).await {
        Ok(username) => username.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "username lookup failed");
            String::new()
        }
    };

    tracing::info!(user_id = %user_id, external_id = %external_id, "identity handshake complete");

    // Client script needs to read both cookies, so neither is HTTP-only.
    let id_cookie = Cookie::build(ID_COOKIE, user_id)
        .path("/")
        .http_only(false)
        .finish();
    let session_cookie = Cookie::build(SESSION_COOKIE, secret.clone())
        .path("/")
        .http_only(false)
        .finish();

    HttpResponse::Ok()
        .cookie(id_cookie)
        .cookie(session_cookie)
        .content_type("text/html; charset=utf-8")
        .body(relay_page(&external_id, &secret, &username))
}

fn redirect_home() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .finish()
}

/// Hand-off page: posts the result to the opener window, then navigates,
/// reloads, and closes. The payload is a JSON *string* (double-encoded), as
/// the client parses the message body itself.
fn relay_page(external_id: &str, token: &str, username: &str) -> String {
    let payload = serde_json::json!({
        "external_id": external_id,
        "token": token,
        "username": username,
    });
    let message = serde_json::Value::String(payload.to_string()).to_string();
    format!(
        r#"<html><body><script type="text/javascript">
	opener.postMessage({message}, '*');
	setTimeout(() => {{
		opener.location.replace("/");
		opener.location.reload();
		window.close();
	}}, 100);
</script></body></html>"#
    )
}
