use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;
use crate::rate_limit::ThrottleSignal;

const REFRESH_ENDPOINT: &str = "auth/token/refresh/";

/// Bearer credential pair. Last write wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// The single outbound HTTP path.
///
/// Attaches the bearer credential, refreshes it once on 401, converts 429 into a
/// breaker trip, and refuses to send while the breaker is cooling down.
#[derive(Clone)]
pub struct Gateway {
    client: Client,
    base_url: Url,
    credentials: Arc<RwLock<Credentials>>,
    throttle: Arc<dyn ThrottleSignal>,
    fallback_retry_after: u64,
}

impl Gateway {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: Url,
        throttle: Arc<dyn ThrottleSignal>,
        fallback_retry_after: u64,
    ) -> Self {
        Self {
            client,
            base_url,
            credentials: Arc::new(RwLock::new(Credentials::default())),
            throttle,
            fallback_retry_after,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Replace both tokens, as after a login.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    /// Forget both tokens, as on logout.
    pub fn clear_credentials(&self) {
        self.set_credentials(Credentials::default());
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credentials().access.is_some()
    }

    /// # Errors
    ///
    /// See [`Gateway::send`]; also `Decode` if the body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let body = self.send(Method::GET, path, None).await?;
        decode(&body)
    }

    /// # Errors
    ///
    /// See [`Gateway::send`]; also `Decode` if the body does not match `T`.
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.send(Method::POST, path, Some(encode(body)?)).await?;
        decode(&body)
    }

    /// POST and ignore the response body.
    ///
    /// # Errors
    ///
    /// See [`Gateway::send`].
    pub async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), GatewayError> {
        let body = body.map(encode).transpose()?;
        self.send(Method::POST, path, body).await.map(drop)
    }

    /// PATCH and ignore the response body.
    ///
    /// # Errors
    ///
    /// See [`Gateway::send`].
    pub async fn patch_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), GatewayError> {
        let body = body.map(encode).transpose()?;
        self.send(Method::PATCH, path, body).await.map(drop)
    }

    /// Send one request and return the raw success body.
    ///
    /// # Errors
    ///
    /// - `RateLimited` while the breaker is cooling down (nothing is sent) or on a 429.
    /// - `ReauthenticationRequired` when a 401 survives one refresh attempt.
    /// - `Forbidden`, `NotFound`, `Status` for other non-success statuses.
    /// - `Transport` for network failures.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<String, GatewayError> {
        if let Some(retry_after_secs) = self.throttle.cooling_down() {
            debug!(%method, path, retry_after_secs, "refusing request while rate limited");
            return Err(GatewayError::RateLimited { retry_after_secs });
        }

        let url = self.endpoint(path)?;
        debug!(%method, %url, "sending request");

        let mut response = self.dispatch(&method, &url, body.as_ref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path, "access token rejected; refreshing");
            self.refresh().await?;
            response = self.dispatch(&method, &url, body.as_ref()).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                warn!(path, "still unauthorized after refresh");
                self.drop_access_token();
                return Err(GatewayError::ReauthenticationRequired);
            }
        }

        self.check(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::InvalidEndpoint(format!("{path}: {e}")))
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Response, GatewayError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = self.credentials().access {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn refresh(&self) -> Result<(), GatewayError> {
        let Some(refresh) = self.credentials().refresh else {
            self.drop_access_token();
            return Err(GatewayError::ReauthenticationRequired);
        };

        let url = self.endpoint(REFRESH_ENDPOINT)?;
        let outcome = self
            .client
            .post(url)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await;

        let access = match outcome {
            Ok(response) if response.status().is_success() => response
                .json::<RefreshResponse>()
                .await
                .ok()
                .map(|r| r.access),
            Ok(response) => {
                warn!(status = %response.status(), "token refresh rejected");
                None
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                None
            }
        };

        match access {
            Some(access) => {
                let mut guard = self
                    .credentials
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                guard.access = Some(access);
                Ok(())
            }
            None => {
                self.clear_credentials();
                Err(GatewayError::ReauthenticationRequired)
            }
        }
    }

    fn drop_access_token(&self) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access = None;
    }

    async fn check(&self, response: Response) -> Result<String, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let headers = response.headers().clone();
        let body: Option<Value> = response
            .text()
            .await
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = retry_after(&headers, body.as_ref())
                    .unwrap_or(self.fallback_retry_after);
                warn!(retry_after_secs, "remote is throttling requests");
                self.throttle.throttled(retry_after_secs);
                Err(GatewayError::RateLimited { retry_after_secs })
            }
            StatusCode::FORBIDDEN => Err(GatewayError::Forbidden),
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
            _ => Err(GatewayError::Status {
                status,
                message: body.as_ref().and_then(error_message),
            }),
        }
    }
}

#[derive(serde::Deserialize)]
struct RefreshResponse {
    access: String,
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, GatewayError> {
    serde_json::to_value(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// `Retry-After` header in seconds, else a `retry_after` body field.
fn retry_after(headers: &HeaderMap, body: Option<&Value>) -> Option<u64> {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    from_header.or_else(|| {
        let field = body?.get("retry_after")?;
        field
            .as_u64()
            .or_else(|| field.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64))
            .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
    })
    .filter(|secs| *secs > 0)
}

fn error_message(body: &Value) -> Option<String> {
    ["error", "detail", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_prefers_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        let body = serde_json::json!({ "retry_after": 40 });
        assert_eq!(retry_after(&headers, Some(&body)), Some(12));
    }

    #[test]
    fn retry_after_falls_back_to_the_body_field() {
        let headers = HeaderMap::new();
        assert_eq!(
            retry_after(&headers, Some(&serde_json::json!({ "retry_after": 7.2 }))),
            Some(8)
        );
        assert_eq!(
            retry_after(&headers, Some(&serde_json::json!({ "retry_after": "15" }))),
            Some(15)
        );
        assert_eq!(retry_after(&headers, None), None);
    }

    #[test]
    fn http_date_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers, None), None);
    }

    #[test]
    fn error_message_reads_common_fields() {
        assert_eq!(
            error_message(&serde_json::json!({ "detail": "nope" })).as_deref(),
            Some("nope")
        );
        assert_eq!(error_message(&serde_json::json!({ "x": 1 })), None);
    }
}
