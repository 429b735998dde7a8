use async_trait::async_trait;
use preventivass_scraper::error::FailureReason;
use preventivass_scraper::models::{Outcome, Profile, Task, Timings};
use preventivass_scraper::report::ResultReporter;
use preventivass_scraper::scheduler::{local_channel, TaskRunner, WorkerPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

fn make_task(plate: &str) -> Task {
    let profile: Profile = serde_json::from_value(serde_json::json!({
        "datiPreventivo": { "idRicerca": 1, "idAccordo": 1, "idFascia": 1 },
        "anag": { "cf": "RSSMRA85T10A562S" },
        "veicolo": { "targa": plate, "tipoVeicolo": "autovettura", "cilindrata": "1242" }
    }))
    .unwrap();
    Task::new(profile, None)
}

/// Fails tasks whose plate starts with "FAIL", succeeds the rest, and
/// tracks how many runs overlap in time.
struct RecordingRunner {
    seen: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingRunner {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    async fn run(&self, task: &Task) -> Outcome {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;
        self.seen.lock().unwrap().push(task.profile.veicolo.targa.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let start = chrono::Utc::now();
        if task.profile.veicolo.targa.starts_with("FAIL") {
            Outcome::Failure {
                reason: FailureReason::Internal,
                message: "synthetic failure".to_string(),
                timings: Timings::since(start),
            }
        } else {
            Outcome::Success {
                quotes: vec![],
                timings: Timings::since(start),
            }
        }
    }
}

#[tokio::test]
async fn failed_task_does_not_stop_the_worker() {
    let (tx, source) = local_channel(8);
    tx.send(make_task("FAIL01")).await.unwrap();
    tx.send(make_task("OK0001")).await.unwrap();
    tx.send(make_task("FAIL02")).await.unwrap();
    tx.send(make_task("OK0002")).await.unwrap();
    drop(tx);

    let runner = Arc::new(RecordingRunner::new());
    let pool = WorkerPool::new(1, Duration::from_millis(1));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    pool.run(
        Arc::new(source),
        runner.clone(),
        Arc::new(ResultReporter::new(None)),
        shutdown_rx,
    )
    .await;

    let seen = runner.seen.lock().unwrap();
    assert_eq!(seen.len(), 4, "every queued task must run");
    assert_eq!(seen[0], "FAIL01");
    assert_eq!(seen[3], "OK0002");
}

#[tokio::test]
async fn single_worker_never_overlaps_tasks() {
    let (tx, source) = local_channel(8);
    for i in 0..5 {
        tx.send(make_task(&format!("OK{:04}", i))).await.unwrap();
    }
    drop(tx);

    let runner = Arc::new(RecordingRunner::new());
    let pool = WorkerPool::new(1, Duration::from_millis(1));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    pool.run(
        Arc::new(source),
        runner.clone(),
        Arc::new(ResultReporter::new(None)),
        shutdown_rx,
    )
    .await;

    assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_workers_drain_the_queue() {
    let (tx, source) = local_channel(8);
    for i in 0..6 {
        tx.send(make_task(&format!("OK{:04}", i))).await.unwrap();
    }
    drop(tx);

    let runner = Arc::new(RecordingRunner::new());
    let pool = WorkerPool::new(2, Duration::from_millis(1));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    pool.run(
        Arc::new(source),
        runner.clone(),
        Arc::new(ResultReporter::new(None)),
        shutdown_rx,
    )
    .await;

    assert_eq!(runner.seen.lock().unwrap().len(), 6);
    assert!(runner.max_in_flight.load(Ordering::SeqCst) <= 2);
}

struct PanickingRunner;

#[async_trait]
impl TaskRunner for PanickingRunner {
    async fn run(&self, _task: &Task) -> Outcome {
        panic!("synthetic panic");
    }
}

#[tokio::test]
async fn panicking_task_does_not_kill_the_pool() {
    let (tx, source) = local_channel(4);
    tx.send(make_task("BOOM01")).await.unwrap();
    tx.send(make_task("BOOM02")).await.unwrap();
    drop(tx);

    let pool = WorkerPool::new(1, Duration::from_millis(1));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    // Completes normally: the panic is contained per task.
    pool.run(
        Arc::new(source),
        Arc::new(PanickingRunner),
        Arc::new(ResultReporter::new(None)),
        shutdown_rx,
    )
    .await;
}

#[tokio::test]
async fn shutdown_stops_idle_workers() {
    let (tx, source) = local_channel(1);

    let pool = WorkerPool::new(2, Duration::from_millis(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        pool.run(
            Arc::new(source),
            Arc::new(RecordingRunner::new()),
            Arc::new(ResultReporter::new(None)),
            shutdown_rx,
        )
        .await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("pool must stop after shutdown")
        .unwrap();
    drop(tx);
}
