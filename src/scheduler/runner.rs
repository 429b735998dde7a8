use crate::address::{Address, AddressNormalizer};
use crate::browser::{Interactor, SessionLifecycle};
use crate::captcha::{ChallengeSolver, TwoCaptcha};
use crate::config::Config;
use crate::error::ScrapeError;
use crate::flow::{check_vehicle_displacement, FlowEngine};
use crate::models::{Outcome, QuoteRecord, Task, Timings};
use crate::scheduler::worker::TaskRunner;
use async_trait::async_trait;
use std::sync::Arc;

/// The production task runner: one exclusively owned browser session per
/// task, torn down on every exit path.
pub struct ScrapeRunner {
    config: Arc<Config>,
    lifecycle: SessionLifecycle,
    normalizer: AddressNormalizer,
    captcha: TwoCaptcha,
}

impl ScrapeRunner {
    pub fn new(config: Arc<Config>) -> Self {
        let lifecycle = SessionLifecycle::new(Arc::clone(&config));
        let here_key = Some(config.here_api_key.clone()).filter(|k| !k.is_empty());
        let normalizer = AddressNormalizer::new(here_key);
        let captcha = TwoCaptcha::new(
            config.apikey_2captcha.clone(),
            std::time::Duration::from_millis(config.captcha_poll_interval_ms),
            std::time::Duration::from_millis(config.captcha_poll_timeout_ms),
        );
        Self {
            config,
            lifecycle,
            normalizer,
            captcha,
        }
    }

    async fn execute(&self, task: &Task) -> Result<Vec<QuoteRecord>, ScrapeError> {
        // Rejected before any session or proxy cost.
        check_vehicle_displacement(&task.profile.veicolo)?;

        let proxy_url = self
            .lifecycle
            .check_egress(&task.id, task.proxy.as_deref())
            .await?;

        let address = self
            .normalizer
            .normalize(&task.id, Address::from(&task.profile.anag))
            .await;

        let mut handle = self.lifecycle.start(&task.id, proxy_url.as_deref()).await?;
        let client = match handle.client() {
            Some(client) => client.clone(),
            None => {
                handle.close().await;
                return Err(ScrapeError::Internal("session closed before use".to_string()));
            }
        };

        let interactor = Interactor::new(client, &self.config, task.id.clone());
        let challenge = ChallengeSolver::new(
            &interactor,
            &self.captcha,
            task.id.clone(),
            self.config.captcha_frame_retries,
        );
        let mut engine = FlowEngine::new(&interactor, challenge, &self.config, task, address);

        let result = engine.run().await;
        handle.close().await;
        result
    }
}

#[async_trait]
impl TaskRunner for ScrapeRunner {
    async fn run(&self, task: &Task) -> Outcome {
        let start = chrono::Utc::now();

        if task.refresh {
            tracing::info!("TID: {} | 🔄 Refresh requested, running fresh", task.id);
        }

        match self.execute(task).await {
            Ok(quotes) => {
                tracing::info!(
                    "TID: {} | ✅ Flow complete | {} quotes",
                    task.id,
                    quotes.len()
                );
                Outcome::Success {
                    quotes,
                    timings: Timings::since(start),
                }
            }
            Err(e) => {
                if e.is_business_rule() {
                    tracing::warn!("TID: {} | ⛔ Task rejected: {}", task.id, e);
                } else {
                    tracing::error!("TID: {} | ❌ Task failed: {}", task.id, e);
                }
                Outcome::Failure {
                    reason: e.reason(),
                    message: e.to_string(),
                    timings: Timings::since(start),
                }
            }
        }
    }
}
