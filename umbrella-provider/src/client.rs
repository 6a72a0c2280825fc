// Async HTTP client for the Cisco Umbrella v2 REST API.
//
// Auth: OAuth2 client credentials exchanged at /auth/v2/token, then a
// bearer token on every request.

use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use url::Url;

use crate::Error;
use crate::config::UmbrellaConfig;

/// Page size used for paginated collection endpoints
pub const PAGE_LIMIT: usize = 100;

/// Upper bound on pages fetched from one collection
const MAX_PAGES: usize = 1000;

/// Tokens are refreshed this long before the API says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const ORG_HEADER: &str = "X-Umbrella-OrgId";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
}

struct AccessToken {
    value: SecretString,
    refresh_at: Instant,
}

/// Async client for the Umbrella v2 API.
pub struct UmbrellaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    api_secret: SecretString,
    token: Mutex<Option<AccessToken>>,
}

impl UmbrellaClient {
    pub fn new(config: &UmbrellaConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(org_id) = &config.org_id {
            let value = HeaderValue::from_str(org_id).map_err(|e| {
                Error::Configuration(format!("invalid organization id '{}': {}", org_id, e))
            })?;
            headers.insert(ORG_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Validate once so that every later join is infallible in practice
        Url::parse(&config.base_url)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Current bearer token, requesting a new one when absent or about to expire
    async fn access_token(&self) -> Result<SecretString, Error> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let url = self.url("/auth/v2/token")?;
        debug!("POST {url} (client credentials)");

        let resp = self
            .http
            .post(url)
            .basic_auth(
                self.api_key.expose_secret(),
                Some(self.api_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: error_message(status, &raw),
            });
        }

        let body = resp.text().await?;
        let token: TokenResponse = decode(&body)?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let value = SecretString::from(token.access_token);

        *guard = Some(AccessToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub async fn get(&self, path: &str) -> Result<JsonValue, Error> {
        self.request(Method::GET, path, &[], None).await
    }

    pub async fn get_with_params(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<JsonValue, Error> {
        self.request(Method::GET, path, params, None).await
    }

    pub async fn post(&self, path: &str, body: &JsonValue) -> Result<JsonValue, Error> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Option<&JsonValue>) -> Result<JsonValue, Error> {
        self.request(Method::PUT, path, &[], body).await
    }

    pub async fn patch(&self, path: &str, body: &JsonValue) -> Result<JsonValue, Error> {
        self.request(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        self.request(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    /// Fetch every item of a collection
    ///
    /// With `paginated`, pages of `PAGE_LIMIT` items are requested until a
    /// short page comes back. `envelope` names the key holding the items when
    /// the endpoint wraps them in an object.
    pub async fn list_all(
        &self,
        path: &str,
        params: &[(&str, String)],
        envelope: Option<&str>,
        paginated: bool,
    ) -> Result<Vec<JsonValue>, Error> {
        if !paginated {
            let body = self.get_with_params(path, params).await?;
            return items_of(body, envelope, path);
        }

        let mut all = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("page", page.to_string()));
            query.push(("limit", PAGE_LIMIT.to_string()));

            let body = self.get_with_params(path, &query).await?;
            let items = items_of(body, envelope, path)?;
            let done = items.len() < PAGE_LIMIT;
            all.extend(items);
            if done {
                return Ok(all);
            }
        }

        warn!("{path}: stopped after {MAX_PAGES} pages");
        Ok(all)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&JsonValue>,
    ) -> Result<JsonValue, Error> {
        let url = self.url(path)?;
        if params.is_empty() {
            debug!("{method} {url}");
        } else {
            debug!("{method} {url} params={params:?}");
        }

        let token = self.access_token().await?;
        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(token.expose_secret());
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        self.handle_response(path, resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response(
        &self,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<JsonValue, Error> {
        let status = resp.status();
        let raw = resp.text().await?;

        if status.is_success() {
            if raw.trim().is_empty() {
                return Ok(JsonValue::Null);
            }
            return decode(&raw);
        }

        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                path: path.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                if status == StatusCode::UNAUTHORIZED {
                    // Force a fresh token next time
                    *self.token.lock().await = None;
                }
                Err(Error::Authentication {
                    message: error_message(status, &raw),
                })
            }
            _ => Err(Error::Api {
                status: status.as_u16(),
                message: error_message(status, &raw),
            }),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_string(),
        }
    })
}

/// Best-effort human readable message from an error body
fn error_message(status: StatusCode, raw: &str) -> String {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(raw)
        && let Some(message) = err.message.or(err.error_message).or(err.error)
    {
        return message;
    }
    if raw.trim().is_empty() {
        status.to_string()
    } else {
        raw.to_string()
    }
}

/// Remove the response envelope, if any
pub fn unwrap_envelope(body: JsonValue, envelope: Option<&str>) -> JsonValue {
    match (envelope, body) {
        (Some(key), JsonValue::Object(mut obj)) if obj.contains_key(key) => {
            obj.remove(key).unwrap_or(JsonValue::Null)
        }
        (_, body) => body,
    }
}

fn items_of(body: JsonValue, envelope: Option<&str>, path: &str) -> Result<Vec<JsonValue>, Error> {
    match unwrap_envelope(body, envelope) {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Null => Ok(Vec::new()),
        other => Err(Error::Deserialization {
            message: format!("{path}: expected a list of items"),
            body: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_vendor_fields() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(
            error_message(status, r#"{"message": "prefixLength is invalid"}"#),
            "prefixLength is invalid"
        );
        assert_eq!(
            error_message(status, r#"{"errorMessage": "duplicate name"}"#),
            "duplicate name"
        );
        assert_eq!(error_message(status, r#"{"error": "invalid_client"}"#), "invalid_client");
        assert_eq!(error_message(status, "upstream timeout"), "upstream timeout");
        assert_eq!(error_message(status, ""), "400 Bad Request");
    }

    #[test]
    fn envelope_is_removed_when_present() {
        let body = json!({"status": {"code": 200}, "data": [{"id": 1}]});
        assert_eq!(unwrap_envelope(body, Some("data")), json!([{"id": 1}]));

        let bare = json!([{"id": 1}]);
        assert_eq!(unwrap_envelope(bare.clone(), Some("data")), bare);
        assert_eq!(unwrap_envelope(bare.clone(), None), bare);
    }

    #[test]
    fn items_of_rejects_objects() {
        assert!(items_of(json!({"id": 1}), None, "/x").is_err());
        assert_eq!(items_of(JsonValue::Null, None, "/x").unwrap().len(), 0);
    }
}
