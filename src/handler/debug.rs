//! `GET /debug`: echo the request and report which settings are present
//!
//! Secrets are reported as "Exists" / "Not Set" only. Request headers that
//! commonly carry credentials are redacted.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Method, Response, StatusCode, Uri};
use serde_json::{json, Map, Value};

use crate::config::{AppState, Secret};
use crate::http;

const REDACTED_HEADERS: [&str; 4] = ["authorization", "cookie", "proxy-authorization", "x-api-key"];

fn presence(secret: &Secret) -> &'static str {
    if secret.is_set() {
        "Exists"
    } else {
        "Not Set"
    }
}

fn headers_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let shown = if REDACTED_HEADERS.contains(&name.as_str()) {
            "[redacted]".to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        map.insert(name.as_str().to_string(), Value::String(shown));
    }
    Value::Object(map)
}

pub fn handle_debug(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Response<Full<Bytes>> {
    let cfg = &state.config;
    let body = json!({
        "success": true,
        "message": "Debug Information",
        "request": {
            "method": method.as_str(),
            "url": uri.to_string(),
            "headers": headers_json(headers),
        },
        "env": {
            "BACKEND": state.backend.name(),
            "BOT_TOKEN": presence(&cfg.auth.bot_token),
            "ASSETS": cfg.assets.dir.is_some(),
            "STATIC_ONLY": cfg.assets.static_only,
            "FOLDER_ID": !cfg.drive.folder_id.is_empty(),
            "API_KEY": presence(&cfg.drive.api_key),
            "ACCESS_TOKEN": presence(&cfg.drive.access_token),
            "B2_KEY_ID": !cfg.b2.key_id.is_empty(),
            "B2_APPLICATION_KEY": presence(&cfg.b2.application_key),
            "B2_BUCKET_NAME": !cfg.b2.bucket_name.is_empty(),
        },
    });
    http::build_json_response(StatusCode::OK, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KvBackend;
    use crate::config::Config;
    use crate::kv::MemoryKv;
    use http_body_util::BodyExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_debug_never_shows_secrets() {
        let mut config = Config::defaults();
        config.auth.bot_token = Secret::new("super-secret");
        config.drive.access_token = Secret::new("ya29.token");
        let backend = Arc::new(KvBackend::new(
            Arc::new(MemoryKv::new()),
            Arc::new(MemoryKv::new()),
        ));
        let state = AppState::from_parts(config, backend, None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc".parse().unwrap());
        headers.insert("user-agent", "curl/8".parse().unwrap());
        let uri: Uri = "/debug?x=1".parse().unwrap();

        let resp = handle_debug(&state, &Method::GET, &uri, &headers);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(!text.contains("super-secret"));
        assert!(!text.contains("ya29.token"));
        assert!(!text.contains("Bearer abc"));

        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["env"]["BOT_TOKEN"], "Exists");
        assert_eq!(json["env"]["API_KEY"], "Not Set");
        assert_eq!(json["request"]["headers"]["user-agent"], "curl/8");
        assert_eq!(json["request"]["url"], "/debug?x=1");
    }
}
