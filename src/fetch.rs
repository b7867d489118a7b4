// src/fetch.rs
//! Bounded-retry page fetching. The trait seam exists so the runner can be
//! exercised without a network.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use crate::error::MonitorError;

const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Idempotent GET; retried internally up to the configured budget.
    async fn fetch(&self, url: &str) -> Result<String, MonitorError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, max_retries: u32, retry_delay_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_secs(retry_delay_secs),
        })
    }

    async fn get_once(&self, url: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("non-2xx from {url}"))?;
        resp.text().await.context("reading response body")
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, MonitorError> {
        fetch_with_retry(self.max_retries, self.retry_delay, || self.get_once(url)).await
    }
}

/// Runs `attempt` up to `max_attempts` times, sleeping `delay` between
/// failures. Exhaustion surfaces the last cause.
pub async fn fetch_with_retry<F, Fut>(
    max_attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> Result<String, MonitorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_err = anyhow!("no fetch attempt made");

    for n in 1..=max_attempts {
        match attempt().await {
            Ok(body) => return Ok(body),
            Err(e) => {
                if n < max_attempts {
                    tracing::warn!(
                        attempt = n,
                        max = max_attempts,
                        error = %e,
                        "fetch attempt failed, retrying after {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = e;
            }
        }
    }

    Err(MonitorError::Fetch {
        attempts: max_attempts,
        source: last_err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn exhaustion_yields_single_fetch_error() {
        let calls = AtomicU32::new(0);
        let res = fetch_with_retry(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("boom")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match res {
            Err(MonitorError::Fetch { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_after_two_failures() {
        let calls = AtomicU32::new(0);
        let res = fetch_with_retry(3, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow!("transient"))
                } else {
                    Ok("body".to_string())
                }
            }
        })
        .await;

        // Two failed attempts (each followed by a retry sleep), then success.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(res.unwrap(), "body");
    }

    #[tokio::test]
    async fn zero_budget_is_clamped_to_one_attempt() {
        let calls = AtomicU32::new(0);
        let _ = fetch_with_retry(0, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("down")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
