use crate::config::{DelayRange, TransportConfig};
use crate::crawler::identity::next_identity;
use crate::crawler::proxy::ProxyProvider;
use crate::crawler::traits::PageFetcher;
use crate::model::{FetchedPage, Portal, RequestKind, TransportError};

use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Rate-limited HTTP transport holding one cookie session for a crawl.
///
/// Every attempt sleeps first (a random delay for the request kind, or an
/// exponential backoff on retries) and carries a freshly rotated identity.
pub struct Transport {
    client: Client,
    jar: Arc<Jar>,
    portal: Portal,
    settings: TransportConfig,
    proxy: Option<String>,
    proxy_provider: Option<Box<dyn ProxyProvider>>,
}

impl Transport {
    pub fn new(portal: Portal, settings: TransportConfig, proxy: Option<String>) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = Self::build_client(jar.clone(), settings.timeout(), proxy.as_deref())?;
        Ok(Self {
            client,
            jar,
            portal,
            settings,
            proxy,
            proxy_provider: None,
        })
    }

    pub fn with_proxy_provider(mut self, provider: Box<dyn ProxyProvider>) -> Self {
        self.proxy_provider = Some(provider);
        self
    }

    fn build_client(jar: Arc<Jar>, timeout: Duration, proxy: Option<&str>) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .cookie_provider(jar)
            .timeout(timeout)
            .gzip(true)
            .brotli(true);

        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| TransportError::Client(format!("invalid proxy '{}': {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| TransportError::Client(e.to_string()))
    }

    fn delay_before(&self, kind: RequestKind, attempt: u32) -> Duration {
        if attempt == 0 {
            let range = match kind {
                RequestKind::Warmup => self.settings.warmup_delay,
                RequestKind::Resolve => self.settings.resolve_delay,
                RequestKind::Search => self.settings.search_delay,
                RequestKind::Detail => self.settings.detail_delay,
            };
            random_delay(range)
        } else {
            let jitter = if self.settings.retry_jitter_secs > 0.0 {
                rand::rng().random_range(0.0..self.settings.retry_jitter_secs)
            } else {
                0.0
            };
            backoff_delay(self.settings.retry_base_secs, attempt, jitter)
        }
    }

    /// Swaps in a replacement egress proxy. The cookie jar is shared with the
    /// rebuilt client so the session survives the swap.
    fn replace_proxy(&mut self) -> bool {
        let Some(provider) = self.proxy_provider.as_mut() else {
            return false;
        };
        let Some(next) = provider.next_proxy() else {
            warn!("No replacement proxy available");
            return false;
        };
        match Self::build_client(self.jar.clone(), self.settings.timeout(), Some(&next)) {
            Ok(client) => {
                info!("Switched egress proxy to {}", next);
                self.client = client;
                self.proxy = Some(next);
                true
            }
            Err(e) => {
                warn!("Replacement proxy rejected: {}", e);
                false
            }
        }
    }

    async fn attempt(&self, url: &str, kind: RequestKind) -> Result<FetchedPage, TransportError> {
        let identity = next_identity();
        let mut request = self.client.get(url).header(USER_AGENT, identity.user_agent);
        for (name, value) in identity.headers {
            request = request.header(*name, *value);
        }
        if kind != RequestKind::Warmup {
            request = request.header(REFERER, self.portal.home_url());
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify(url, e))?;
        debug!("Fetched {} ({} bytes)", final_url, body.len());

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for Transport {
    async fn fetch(&mut self, url: &str, kind: RequestKind) -> Result<FetchedPage, TransportError> {
        let mut ceiling = self.settings.max_attempts.max(1);
        let mut proxy_replaced = false;
        let mut attempt: u32 = 0;

        loop {
            let delay = self.delay_before(kind, attempt);
            if !delay.is_zero() {
                debug!("Waiting {:.2}s before {:?} request to {}", delay.as_secs_f64(), kind, url);
                sleep(delay).await;
            }

            let err = match self.attempt(url, kind).await {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            attempt += 1;
            warn!("Attempt {}/{} for {} failed: {}", attempt, ceiling, url, err);
            if attempt < ceiling {
                continue;
            }

            // One more attempt through a fresh proxy before giving up.
            if !proxy_replaced && self.proxy.is_some() && self.replace_proxy() {
                proxy_replaced = true;
                ceiling += 1;
                continue;
            }

            return Err(err);
        }
    }
}

fn classify(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout { url: url.to_string() }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1) + jitter`.
pub fn backoff_delay(base_secs: f64, attempt: u32, jitter_secs: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as i32;
    let secs = base_secs * 2f64.powi(exponent) + jitter_secs;
    Duration::from_secs_f64(secs.max(0.0))
}

pub fn random_delay(range: DelayRange) -> Duration {
    if range.is_zero() {
        return Duration::ZERO;
    }
    let secs = if range.max_secs > range.min_secs {
        rand::rng().random_range(range.min_secs..range.max_secs)
    } else {
        range.min_secs
    };
    Duration::from_secs_f64(secs.max(0.0))
}
