use crate::models::Task;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;

/// Where workers take their tasks from. next_task returning None means the
/// source is exhausted and the worker may shut down.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn next_task(&self) -> Option<Task>;
}

/// In-process queue fed from a file or test code.
pub struct LocalTaskSource {
    rx: Mutex<mpsc::Receiver<Task>>,
}

pub fn local_channel(capacity: usize) -> (mpsc::Sender<Task>, LocalTaskSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, LocalTaskSource { rx: Mutex::new(rx) })
}

#[async_trait]
impl TaskSource for LocalTaskSource {
    async fn next_task(&self) -> Option<Task> {
        self.rx.lock().await.recv().await
    }
}

/// Long-polls a remote dispatcher for work. 204 and transport errors both
/// mean "nothing right now": sleep and ask again.
pub struct RemoteTaskSource {
    http: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
}

impl RemoteTaskSource {
    pub fn new(endpoint: String, poll_interval: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            poll_interval,
        }
    }
}

#[async_trait]
impl TaskSource for RemoteTaskSource {
    async fn next_task(&self) -> Option<Task> {
        loop {
            match self.http.get(&self.endpoint).send().await {
                Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                    match resp.json::<Task>().await {
                        Ok(task) => return Some(task),
                        Err(e) => {
                            tracing::warn!("📥 Dispatcher sent an unparseable task: {}", e);
                        }
                    }
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::NO_CONTENT => {
                    tracing::debug!("📥 Dispatcher has no work");
                }
                Ok(resp) => {
                    tracing::warn!("📥 Dispatcher answered {}", resp.status());
                }
                Err(e) => {
                    tracing::warn!("📥 Dispatcher unreachable: {}", e);
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}
