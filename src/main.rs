use preventivass_scraper::captcha::TwoCaptcha;
use preventivass_scraper::config::{Config, QueueMode};
use preventivass_scraper::models::Task;
use preventivass_scraper::report::ResultReporter;
use preventivass_scraper::scheduler::{
    local_channel, RemoteTaskSource, ScrapeRunner, TaskSource, WorkerPool,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,preventivass_scraper=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    tracing::info!("🚀 Quote scraper starting");
    tracing::info!("🌐 Target: {}", config.target_url);
    tracing::info!("👷 Workers: {}", config.workers);

    if !config.apikey_2captcha.is_empty() {
        let solver = TwoCaptcha::new(
            config.apikey_2captcha.clone(),
            Duration::from_millis(config.captcha_poll_interval_ms),
            Duration::from_millis(config.captcha_poll_timeout_ms),
        );
        match solver.balance().await {
            Ok(balance) => tracing::info!("🧩 Captcha service balance: ${}", balance),
            Err(e) => tracing::warn!("🧩 Captcha service balance check failed: {}", e),
        }
    } else {
        tracing::warn!("🧩 No captcha api key configured, challenges will not be solved");
    }

    let source: Arc<dyn TaskSource> = match config.queue_mode {
        QueueMode::Remote => {
            let endpoint = config
                .task_endpoint
                .clone()
                .ok_or("TASK_ENDPOINT is required in remote queue mode")?;
            tracing::info!("📥 Remote task source: {}", endpoint);
            Arc::new(RemoteTaskSource::new(
                endpoint,
                Duration::from_millis(config.task_poll_interval_ms),
            ))
        }
        QueueMode::Local => {
            tracing::info!("📥 Local task source: {}", config.tasks_file);
            let raw = tokio::fs::read_to_string(&config.tasks_file).await?;
            let tasks: Vec<Task> = serde_json::from_str(&raw)?;
            tracing::info!("📥 {} tasks loaded", tasks.len());

            let (tx, source) = local_channel(tasks.len().max(1));
            for task in tasks {
                // Receiver outlives this loop, capacity covers the batch.
                tx.send(task).await.map_err(|e| e.to_string())?;
            }
            drop(tx);
            Arc::new(source)
        }
    };

    let reporter = Arc::new(ResultReporter::new(config.collector_url.clone()));
    let runner = Arc::new(ScrapeRunner::new(Arc::clone(&config)));
    let pool = WorkerPool::new(config.workers, Duration::from_millis(config.task_pacing_ms));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Shutdown requested, letting workers finish their task");
            let _ = shutdown_tx.send(true);
        }
    });

    pool.run(source, runner, reporter, shutdown_rx).await;

    tracing::info!("👋 All workers stopped");
    Ok(())
}
