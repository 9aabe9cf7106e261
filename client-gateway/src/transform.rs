// client-gateway/src/transform.rs
//! Pure content transformations applied to archive entries before they are
//! sent to the browser.

use once_cell::sync::Lazy;
use regex::Regex;

/// Substring used to detect an already-injected shim.
const SHIM_MARKER: &str = "localStorage.prevAuth = localStorage.auth;";

/// Bootstrap shim injected into `index.html` ahead of the title tag.
///
/// Normalizes the stored auth flag to the guest sentinel when the last token
/// refresh is stale, keeps a one-second heartbeat on `lastToken`, clears the
/// `id`/`session` cookies on unload while logged out, and bounds the local
/// code cache to its two most recent entries once it passes 1 MiB.
const BOOTSTRAP_SHIM: &str = r#"<script>
	if (
		(localStorage.auth === 'null' && localStorage.prevAuth === 'null') ||
		!(Date.now() - localStorage.lastToken < 2 * 60000) ||
		(localStorage.prevAuth !== '"guest"' && (localStorage.auth === 'null' || !localStorage.auth))
	) {
		localStorage.auth = '"guest"';
	}
	localStorage.tutorialVisited = 'true';
	localStorage.placeSpawnTutorialAsked = '1';
	localStorage.prevAuth = localStorage.auth;
	localStorage.lastToken = Date.now();
	(function() {
		let auth = localStorage.auth;
		setInterval(() => {
			if (auth !== localStorage.auth) {
				auth = localStorage.auth;
				localStorage.lastToken = Date.now();
			}
		}, 1000);
	})();
	addEventListener('beforeunload', () => {
		if (localStorage.auth === 'null') {
			document.cookie = 'id=';
			document.cookie = 'session=';
		}
	});
	try {
		if ((localStorage.codeCache || '').length > 1024 * 1024) {
			const entries = Object.entries(JSON.parse(localStorage.codeCache));
			entries.sort((left, right) => right[1].timestamp - left[1].timestamp);
			localStorage.codeCache = JSON.stringify(Object.fromEntries(entries.slice(0, 2)));
		}
	} catch (err) {
		delete localStorage.codeCache;
	}
</script>"#;

/// Replacement body for `config.js`: points the client at local routes and
/// disables sandbox/debug switches.
const CONFIG_JS: &str = r#"
	var HISTORY_URL = undefined;
	var API_URL = '/api/';
	var WEBSOCKET_URL = '/socket/';
	var CONFIG = {
		API_URL: API_URL,
		HISTORY_URL: HISTORY_URL,
		WEBSOCKET_URL: WEBSOCKET_URL,
		PREFIX: '',
		IS_PTR: false,
		DEBUG: false,
		XSOLLA_SANDBOX: false,
	};
"#;

/// Official CDN origin baked into `build.min.js`.
const CDN_ORIGIN: &str = "https://d3os7yery2usni.cloudfront.net/";
const ASSETS_PREFIX: &str = "/assets/";

/// Ordered tracker neutralization rules.
///
/// Each pattern matches an inline `<script>` block by vendor keyword. The
/// replacement is either empty or a stand-in that swallows all further calls
/// to the vendor's global, so the page keeps running without outbound
/// telemetry.
static TRACKER_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("xsolla", ""),
        (
            "facebook",
            "<script>fbq = new Proxy(() => fbq, { get: () => fbq })</script>",
        ),
        (
            "google",
            "<script>ga = new Proxy(() => ga, { get: () => ga })</script>",
        ),
        (
            "mxpnl",
            "<script>mixpanel = new Proxy(() => mixpanel, { get: () => mixpanel })</script>",
        ),
        (
            "twttr",
            "<script>twttr = new Proxy(() => twttr, { get: () => twttr })</script>",
        ),
        (
            "onRecaptchaLoad",
            "<script>function onRecaptchaLoad(){}</script>",
        ),
    ]
    .into_iter()
    .map(|(keyword, replacement)| {
        let pattern = format!("<script[^>]*>[^>]*{}[^>]*</script>", keyword);
        (Regex::new(&pattern).expect("tracker pattern is valid"), replacement)
    })
    .collect()
});

/// Transform an archive entry's raw bytes into the bytes actually served.
pub fn transform(path: &str, raw: Vec<u8>) -> Vec<u8> {
    match path {
        "index.html" => transform_index(String::from_utf8_lossy(&raw).into_owned()).into_bytes(),
        "config.js" => CONFIG_JS.as_bytes().to_vec(),
        "build.min.js" => String::from_utf8_lossy(&raw)
            .replace(CDN_ORIGIN, ASSETS_PREFIX)
            .into_bytes(),
        _ => raw,
    }
}

fn transform_index(mut body: String) -> String {
    if !body.contains(SHIM_MARKER) {
        if let Some(at) = body.find("<title") {
            body.insert_str(at, BOOTSTRAP_SHIM);
        }
    }
    for (pattern, replacement) in TRACKER_RULES.iter() {
        body = pattern.replace_all(&body, *replacement).into_owned();
    }
    body
}
