//! Session-holding HTTP client for the remote source.
//!
//! One instance lives for one execution run: the cookie jar it accumulates
//! is dropped with it, never persisted across runs. Every outbound call is
//! serialized through the shared rate limiter and retried on transient
//! failure with exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::error::{AppError, Result};
use crate::models::{HttpConfig, RetryConfig};
use crate::utils::{BackoffPolicy, RateLimiter};

/// Extra delay after a 429 beyond the regular backoff schedule.
const RATE_LIMIT_PENALTY: Duration = Duration::from_millis(1500);

/// HTTP client wrapper scoped to one execution run.
pub struct SessionClient {
    client: Client,
    limiter: Arc<RateLimiter>,
    backoff: BackoffPolicy,
}

impl SessionClient {
    /// Build a client with a fresh cookie jar.
    pub fn new(
        http: &HttpConfig,
        retry: &RetryConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            limiter,
            backoff: BackoffPolicy::from(retry),
        })
    }

    /// GET a page and return its body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.execute(url, || self.client.get(url)).await?;
        Ok(response.text().await?)
    }

    /// GET a document and return its raw bytes.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.execute(url, || self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// POST a form and return the response body as text.
    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        let response = self
            .execute(url, || self.client.post(url).form(form))
            .await?;
        Ok(response.text().await?)
    }

    /// Issue a request, rate-limited and retried. Retries cover network
    /// failures and non-success statuses (429/5xx and any other non-2xx);
    /// redirects are followed by the client itself.
    async fn execute<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_status: Option<u16> = None;

        for attempt in 1..=self.backoff.max_attempts {
            self.limiter.acquire().await;

            let rate_limited = match build().send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    last_status = Some(status);
                    status == 429
                }
                Err(error) => {
                    log::debug!("request error for {url}: {error}");
                    false
                }
            };

            match self.backoff.delay_after(attempt) {
                Some(mut delay) => {
                    if rate_limited {
                        delay += RATE_LIMIT_PENALTY;
                    }
                    log::warn!(
                        "retrying {url} (attempt {attempt}, status {:?}) in {:?}",
                        last_status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => break,
            }
        }

        Err(AppError::Fetch {
            url: url.to_string(),
            last_status,
            attempts: self.backoff.max_attempts,
        })
    }
}
