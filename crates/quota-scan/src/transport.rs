use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::scan_types::TransportError;

/// Value of the `action` form field the quota view expects
const ACTION_KAPASITAS: &str = "kapasitas";

/// Path of the AJAX view endpoint, relative to the base URL
const GET_VIEW_PATH: &str = "/website/home/get_view";

/// Source of raw quota-table markup
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the quota table for one site and month
    async fn fetch(&self, site_id: u32, year_month: &str) -> Result<String, TransportError>;
}

/// Builds fresh transports, used on start-up and on every refresh
pub trait TransportFactory: Send + Sync {
    /// Build a new transport with its own connection pool and cookies
    fn build(&self) -> Result<Box<dyn Transport>, TransportError>;
}

/// Retry behaviour of the transport, applied per request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries of any kind (default: 5)
    pub total: u32,

    /// Maximum retries after connection failures (default: 3)
    pub connect: u32,

    /// Maximum retries after read failures (default: 3)
    pub read: u32,

    /// Delay before the first retry, doubled on each further retry (default: 0.8s)
    pub backoff_factor: Duration,

    /// Upper bound on any single retry delay (default: 120s)
    pub backoff_max: Duration,

    /// Statuses worth retrying
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total: 5,
            connect: 3,
            read: 3,
            backoff_factor: Duration::from_millis(800),
            backoff_max: Duration::from_secs(120),
            status_forcelist: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay before the `retry`-th retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_factor
            .saturating_mul(factor)
            .min(self.backoff_max)
    }

    fn should_retry_status(&self, status: StatusCode) -> bool {
        self.status_forcelist.contains(&status.as_u16())
    }
}

/// Configuration of the HTTP transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Site root; also sent as `Origin` and `Referer`
    pub base_url: String,

    /// Connect timeout (default: 5s)
    pub connect_timeout: Duration,

    /// Read timeout (default: 45s)
    pub read_timeout: Duration,

    /// Force IPv4 and enable TCP keepalive
    pub force_ipv4: bool,

    /// Browser user agent
    pub user_agent: String,

    /// Retry behaviour
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bromotenggersemeru.id".to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(45),
            force_ipv4: false,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client for the quota view endpoint
pub struct HttpTransport {
    client: Client,
    view_url: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Create a new client. Ambient proxy settings are ignored.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url.trim_end_matches('/');

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html, */*; q=0.01"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(header::ORIGIN, header_value(base_url)?);
        headers.insert(header::REFERER, header_value(&format!("{}/", base_url))?);

        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .no_proxy()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout);

        if config.force_ipv4 {
            builder = builder
                .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
                .tcp_keepalive(Duration::from_secs(30))
                .tcp_keepalive_interval(Duration::from_secs(10))
                .tcp_keepalive_retries(3);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            view_url: format!("{}{}", base_url, GET_VIEW_PATH),
            retry: config.retry.clone(),
        })
    }

    async fn post_view(&self, site_id: &str, year_month: &str) -> Result<Response, reqwest::Error> {
        self.client
            .post(&self.view_url)
            .form(&[
                ("action", ACTION_KAPASITAS),
                ("id_site", site_id),
                ("year_month", year_month),
            ])
            .send()
            .await
    }

    /// Issue the POST, retrying within the policy's budgets
    async fn send_with_retry(&self, site_id: u32, year_month: &str) -> Result<Response, TransportError> {
        let site_id = site_id.to_string();
        let mut retries = 0u32;
        let mut connect_retries = 0u32;
        let mut read_retries = 0u32;

        loop {
            let delay = match self.post_view(&site_id, year_month).await {
                Ok(response) => {
                    let status = response.status();
                    if !self.retry.should_retry_status(status) || retries >= self.retry.total {
                        return Ok(response);
                    }

                    warn!(
                        status = status.as_u16(),
                        retry = retries + 1,
                        "Retryable status from get_view"
                    );
                    retry_after(&response)
                        .map(|d| d.min(self.retry.backoff_max))
                        .unwrap_or_else(|| self.retry.backoff(retries + 1))
                }
                Err(e) => {
                    let is_connect = e.is_connect();
                    let (used, budget) = if is_connect {
                        (&mut connect_retries, self.retry.connect)
                    } else {
                        (&mut read_retries, self.retry.read)
                    };

                    if *used >= budget || retries >= self.retry.total {
                        return Err(TransportError::RetriesExhausted {
                            attempts: retries + 1,
                            message: classify_error(&e).to_string(),
                        });
                    }
                    *used += 1;

                    warn!(
                        error = %e,
                        connect = is_connect,
                        retry = retries + 1,
                        "Request to get_view failed, will retry"
                    );
                    self.retry.backoff(retries + 1)
                }
            };

            retries += 1;
            debug!(retry = retries, delay_ms = delay.as_millis() as u64, "Retrying after delay");
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, site_id: u32, year_month: &str) -> Result<String, TransportError> {
        let started = Instant::now();
        let response = self.send_with_retry(site_id, year_month).await?;
        let headers_at = Instant::now();

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("");

        if !status.is_success() {
            warn!(status = status.as_u16(), reason, "get_view failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| classify_error(&e))?;
        let done = Instant::now();

        info!(
            status = status.as_u16(),
            reason,
            bytes = html.len(),
            total_secs = (done - started).as_secs_f64(),
            recv_secs = (done - headers_at).as_secs_f64(),
            "[get_view]"
        );

        Ok(html)
    }
}

/// Builds [`HttpTransport`]s from one configuration
#[derive(Debug, Clone, Default)]
pub struct HttpTransportFactory {
    config: TransportConfig,
}

impl HttpTransportFactory {
    /// Create a factory for the given configuration
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn build(&self) -> Result<Box<dyn Transport>, TransportError> {
        debug!(
            base_url = %self.config.base_url,
            force_ipv4 = self.config.force_ipv4,
            "Building HTTP transport"
        );
        Ok(Box::new(HttpTransport::new(&self.config)?))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value)
        .map_err(|e| TransportError::Client(format!("Invalid header value {}: {}", value, e)))
}

fn retry_after(response: &Response) -> Option<Duration> {
    let status = response.status();
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }

    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify_error(e: &reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Read(e.to_string())
    }
}
