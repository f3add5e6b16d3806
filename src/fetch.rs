// src/fetch.rs
// HTTP fetch capability with a reusable retry policy. Backoff timing is
// injected through `Sleeper` so retry behavior is testable without real
// delays.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Browser-like agent: some of the configured sources reject default
/// library user agents.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Async sleep indirection for backoff pauses.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the Tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Exponential backoff: `base_delay * 2^attempt` between tries, bounded by
/// `max_retries` extra attempts after the first.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            max_retries,
            base_delay,
            sleeper,
        }
    }

    /// One initial attempt plus two retries, one-second base delay.
    pub fn standard() -> Self {
        Self::new(2, Duration::from_secs(1), Arc::new(TokioSleeper))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `op` until it succeeds or the retry budget is exhausted; the last
    /// error is returned as-is.
    pub async fn run<T, E, Fut, Op>(&self, mut op: Op) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_retries {
                        return Err(error);
                    }
                    self.sleeper.sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Shared HTTP fetcher used by all source adapters.
#[derive(Clone)]
pub struct Fetcher {
    http: Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(retry: RetryPolicy) -> Self {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, retry }
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.http.get(url).send().await?;
        Ok(response.error_for_status()?)
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        self.retry
            .run(|| async {
                let response = self.get_checked(url).await?;
                response.text().await.map_err(anyhow::Error::from)
            })
            .await
            .with_context(|| format!("failed to fetch text from {url}"))
    }

    pub async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        self.retry
            .run(|| async {
                let response = self.get_checked(url).await?;
                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
            .with_context(|| format!("failed to fetch json from {url}"))
    }
}
