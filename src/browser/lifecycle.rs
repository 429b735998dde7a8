use crate::browser::driver::create_webdriver_client;
use crate::config::Config;
use crate::error::ScrapeError;
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const EGRESS_CHECK_URL: &str = "http://ip-api.com/json";
const READY_STATE_SCRIPT: &str = "return document.readyState === 'complete';";

/// The part of a browser session the handle manages: its teardown.
#[async_trait]
pub trait ManagedSession: Send {
    async fn shutdown(self) -> Result<(), CmdError>;
}

#[async_trait]
impl ManagedSession for Client {
    async fn shutdown(self) -> Result<(), CmdError> {
        self.close().await
    }
}

/// An exclusively owned browser session. Close is idempotent so every exit
/// path of the task runner can call it without double-teardown.
pub struct SessionHandle<C: ManagedSession = Client> {
    client: Option<C>,
    task_id: String,
}

impl<C: ManagedSession> SessionHandle<C> {
    pub fn new(client: C, task_id: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            task_id: task_id.into(),
        }
    }

    pub fn client(&self) -> Option<&C> {
        self.client.as_ref()
    }

    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.shutdown().await {
                tracing::warn!("TID: {} | ⚠️ Browser session close failed: {}", self.task_id, e);
            } else {
                tracing::info!("TID: {} | 🔒 Browser session closed", self.task_id);
            }
        }
    }
}

impl<C: ManagedSession> Drop for SessionHandle<C> {
    fn drop(&mut self) {
        if self.client.is_some() {
            tracing::warn!(
                "TID: {} | ⚠️ Session handle dropped while still open; WebDriver session leaked",
                self.task_id
            );
        }
    }
}

/// The country field of an ip-api.com lookup.
pub fn egress_country(body: &Value) -> String {
    body.get("countryCode")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// The target only serves Italian traffic, so any egress is gated on IT.
pub fn check_egress_country(country: &str) -> Result<(), ScrapeError> {
    if country.eq_ignore_ascii_case("it") {
        Ok(())
    } else {
        Err(ScrapeError::ProxyCountry(country.to_string()))
    }
}

/// Owns session establishment: egress country verification, browser
/// startup and the entry-page load with retries.
pub struct SessionLifecycle {
    config: Arc<Config>,
}

impl SessionLifecycle {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Verifies that the egress IP is Italian before spending a browser
    /// session. The lookup runs through the proxy when one applies and
    /// directly otherwise; both must land in IT. Returns the proxy url to
    /// hand to the browser, or None when no proxy is in play.
    pub async fn check_egress(
        &self,
        task_id: &str,
        task_proxy: Option<&str>,
    ) -> Result<Option<String>, ScrapeError> {
        let proxy_url = self.config.proxy_url(task_proxy);

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(5));
        if let Some(ref proxy) = proxy_url {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|e| ScrapeError::Internal(format!("invalid proxy url: {}", e)))?,
            );
        } else {
            tracing::debug!("TID: {} | No proxy configured, checking direct egress", task_id);
        }
        let client = builder
            .build()
            .map_err(|e| ScrapeError::Internal(format!("egress client build failed: {}", e)))?;

        let body: Value = client.get(EGRESS_CHECK_URL).send().await?.json().await?;
        let country = egress_country(&body);

        if let Err(e) = check_egress_country(&country) {
            tracing::warn!(
                "TID: {} | 🌍 Egress country is '{}', expected IT",
                task_id,
                country
            );
            return Err(e);
        }

        tracing::info!(
            "TID: {} | 🌍 Egress verified (IT{})",
            task_id,
            if proxy_url.is_some() { ", proxied" } else { "" }
        );
        Ok(proxy_url)
    }

    /// Starts a browser session and loads the entry page, retrying the load
    /// until document.readyState reports complete. The session is torn down
    /// before returning an error so a failed start never leaks a browser.
    pub async fn start(
        &self,
        task_id: &str,
        proxy_url: Option<&str>,
    ) -> Result<SessionHandle, ScrapeError> {
        let client = create_webdriver_client(&self.config, proxy_url).await?;
        tracing::info!("TID: {} | 🚀 Browser session established", task_id);

        let mut handle = SessionHandle::new(client, task_id);

        match self.load_entry_page(task_id, &handle).await {
            Ok(()) => Ok(handle),
            Err(e) => {
                handle.close().await;
                Err(e)
            }
        }
    }

    async fn load_entry_page(
        &self,
        task_id: &str,
        handle: &SessionHandle,
    ) -> Result<(), ScrapeError> {
        let client = handle
            .client()
            .ok_or_else(|| ScrapeError::Internal("session already closed".to_string()))?;

        for attempt in 1..=self.config.page_load_retries {
            tracing::info!(
                "TID: {} | 🌐 Loading entry page (attempt {}/{})",
                task_id,
                attempt,
                self.config.page_load_retries
            );

            if let Err(e) = client.goto(&self.config.target_url).await {
                tracing::warn!("TID: {} | ⚠️ Navigation failed: {}", task_id, e);
                sleep(Duration::from_secs(2)).await;
                continue;
            }

            if self.wait_document_ready(client).await? {
                tracing::info!("TID: {} | ✅ Entry page ready", task_id);
                return Ok(());
            }

            tracing::warn!("TID: {} | ⚠️ Page never reached readyState complete", task_id);
        }

        Err(ScrapeError::PageLoad(format!(
            "entry page failed to load after {} attempts",
            self.config.page_load_retries
        )))
    }

    async fn wait_document_ready(&self, client: &Client) -> Result<bool, ScrapeError> {
        for _ in 0..30 {
            let ready = client.execute(READY_STATE_SCRIPT, vec![]).await?;
            if ready.as_bool().unwrap_or(false) {
                return Ok(true);
            }
            sleep(Duration::from_millis(500)).await;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSession(Arc<AtomicUsize>);

    #[async_trait]
    impl ManagedSession for CountingSession {
        async fn shutdown(self) -> Result<(), CmdError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn flow_stub(fail: bool) -> Result<(), ScrapeError> {
        if fail {
            return Err(ScrapeError::PreRegistration);
        }
        Ok(())
    }

    /// Mirrors the runner's shape: a flow that may fail, with close called
    /// both on the error branch and on the common tail.
    async fn run_with_teardown(fail: bool) -> usize {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut handle = SessionHandle::new(CountingSession(Arc::clone(&shutdowns)), "test");

        if flow_stub(fail).await.is_err() {
            handle.close().await;
        }
        handle.close().await;

        shutdowns.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_teardown_runs_exactly_once_on_success() {
        assert_eq!(run_with_teardown(false).await, 1);
    }

    #[tokio::test]
    async fn test_teardown_runs_exactly_once_when_flow_fails() {
        assert_eq!(run_with_teardown(true).await, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut handle = SessionHandle::new(CountingSession(Arc::clone(&shutdowns)), "test");

        handle.close().await;
        handle.close().await;
        handle.close().await;

        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(handle.client().is_none());
    }

    #[test]
    fn test_egress_country_parse() {
        assert_eq!(egress_country(&json!({"countryCode": "IT"})), "IT");
        assert_eq!(egress_country(&json!({"countryCode": "DE"})), "DE");
        assert_eq!(egress_country(&json!({})), "");
    }

    #[test]
    fn test_egress_gate_requires_italy() {
        assert!(check_egress_country("IT").is_ok());
        assert!(check_egress_country("it").is_ok());

        let err = check_egress_country("DE").unwrap_err();
        assert_eq!(err.reason(), FailureReason::ProxyCountry);
        assert!(check_egress_country("").is_err());
    }
}
