use crate::core::config::FetchConfig;
use crate::{MapError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Url;

/// Shared async HTTP client; connection pooling is per process
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(FetchConfig::default().user_agent)
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
        .unwrap_or_else(|err| {
            log::warn!("falling back to default HTTP client: {}", err);
            reqwest::Client::new()
        })
});

/// Status and body of one remote response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A GET against the feature API.
///
/// `Err` means the request never produced a response (connection failure,
/// or a timeout when one is configured). Any HTTP status, including errors,
/// is an `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<TransportResponse>;
}

/// [`Transport`] over the shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Option<std::time::Duration>,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&FetchConfig::default())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        let mut request = HTTP_CLIENT
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

/// `{base}/{resource}` with the given query parameters
pub fn build_url(base_url: &str, resource: &str, params: &[(&str, String)]) -> Result<Url> {
    let endpoint = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        resource.trim_start_matches('/')
    );
    Url::parse_with_params(&endpoint, params)
        .map_err(|err| MapError::InvalidUrl(format!("{}: {}", endpoint, err)))
}
