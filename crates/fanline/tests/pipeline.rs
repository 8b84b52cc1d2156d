use core::time::Duration;
use fanline::{
    CompletionSummary, Event, ItemError, Observer, Pipeline, PipelineConfig, Processor, WorkItem,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::timeout;

/// Processor with a fixed delay that records how many items it is handling at
/// once.
#[derive(Clone, Default)]
struct Tracked {
    delay: Duration,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

impl Processor for Tracked {
    async fn process(&self, worker_id: usize, item: WorkItem) -> Result<String, ItemError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("worker {worker_id} processed {}", item.id))
    }
}

/// Fails every item with an odd id.
struct FailOdd;

impl Processor for FailOdd {
    async fn process(&self, _worker_id: usize, item: WorkItem) -> Result<String, ItemError> {
        if item.id % 2 == 1 {
            return Err(ItemError::Failed {
                reason: format!("odd id {}", item.id),
            });
        }
        Ok(item.id.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Recorded {
    BatchStarted(u64),
    BatchDone(u64, usize),
    Ok(u64),
    Failed(u64),
    GeneratorStopped,
    Completed,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    fn events(&self) -> Vec<Recorded> {
        self.0.lock().clone()
    }
}

impl Observer for Recorder {
    fn on_event(&self, event: &Event<'_>) {
        let recorded = match *event {
            Event::BatchStarted { batch } => Recorded::BatchStarted(batch),
            Event::BatchDone { batch, submitted } => Recorded::BatchDone(batch, submitted),
            Event::ItemSucceeded { id, .. } => Recorded::Ok(id),
            Event::ItemFailed { id, .. } => Recorded::Failed(id),
            Event::GeneratorStopped(_) => Recorded::GeneratorStopped,
            Event::Completed(_) => Recorded::Completed,
        };
        self.0.lock().push(recorded);
    }
}

fn config() -> fanline::PipelineConfigBuilder {
    PipelineConfig::builder()
        .batch_period(Duration::from_millis(1))
        .fixed_latency(Duration::ZERO)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_processes_all_items() {
    let config = config()
        .admission_capacity(5)
        .workers(1)
        .batches(1)
        .batch_size(10)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config);
    let gate = pipeline.gate().clone();

    let summary = timeout(Duration::from_secs(5), pipeline.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.submitted, 10);
    assert_eq!(summary.processed, 10);
    assert_eq!(summary.errored, 0);
    assert!(!summary.cancelled);
    assert!(gate.peak() <= 5);
    assert_eq!(gate.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn generator_blocks_once_capacity_is_reached() {
    let config = config()
        .admission_capacity(2)
        .workers(3)
        .batches(1)
        .batch_size(3)
        .input_buffer(4)
        .build()
        .unwrap();
    let processor = Tracked::new(Duration::from_millis(100));
    let max_active = Arc::clone(&processor.max_active);
    let pipeline = Pipeline::new(config).with_processor(processor);
    let gate = pipeline.gate().clone();

    let run = tokio::spawn(pipeline.run());

    // The first two items are admitted; the third waits for a release even
    // though a worker and queue space are free.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gate.outstanding(), 2);

    let summary = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(gate.peak(), 2);
    assert!(max_active.load(Ordering::SeqCst) <= 2);
    assert!(
        summary.elapsed >= Duration::from_millis(200),
        "third item must wait for the first to finish, took {:?}",
        summary.elapsed
    );
    assert_eq!(gate.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_mid_run_terminates_promptly_without_leaking_permits() {
    let config = config()
        .admission_capacity(20)
        .workers(4)
        .batches(1_000)
        .batch_size(100)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).with_processor(Tracked::new(Duration::from_millis(5)));
    let gate = pipeline.gate().clone();
    let shutdown = pipeline.shutdown_handle();

    let run = tokio::spawn(pipeline.run());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(gate.outstanding() > 0);
    shutdown.cancel();

    let summary = timeout(Duration::from_secs(2), run)
        .await
        .expect("pipeline did not stop after cancellation")
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.processed > 0);
    assert!(summary.processed < 100_000);
    assert!(summary.processed <= summary.submitted);
    assert!(gate.peak() <= 20);
    assert_eq!(gate.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_batches_completes_immediately() {
    let config = config()
        .batches(0)
        .batch_period(Duration::from_secs(60))
        .build()
        .unwrap();
    let recorder = Recorder::default();
    let pipeline = Pipeline::new(config).with_observer(recorder.clone());

    let summary = timeout(Duration::from_secs(1), pipeline.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.submitted, 0);
    assert_eq!(summary.processed, 0);
    assert!(!summary.cancelled);
    assert_eq!(
        recorder.events(),
        vec![Recorded::GeneratorStopped, Recorded::Completed]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_submitted_item_yields_exactly_one_result() {
    // Randomized latency shuffles completion order across workers.
    let config = PipelineConfig::builder()
        .batch_period(Duration::from_millis(1))
        .workers(8)
        .batches(5)
        .batch_size(40)
        .admission_capacity(16)
        .latency(Duration::ZERO, Duration::from_millis(2))
        .build()
        .unwrap();
    let recorder = Recorder::default();
    let summary = Pipeline::new(config)
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.submitted, 200);
    assert_eq!(summary.processed, 200);

    let ids: Vec<u64> = recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Recorded::Ok(id) => Some(id),
            _ => None,
        })
        .collect();
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(unique, (0..200).collect());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batches_are_announced_in_order() {
    let config = config().workers(2).batches(3).batch_size(4).build().unwrap();
    let recorder = Recorder::default();
    Pipeline::new(config)
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    let batches: Vec<Recorded> = recorder
        .events()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                Recorded::BatchStarted(_) | Recorded::BatchDone(..)
            )
        })
        .collect();
    assert_eq!(
        batches,
        vec![
            Recorded::BatchStarted(0),
            Recorded::BatchDone(0, 4),
            Recorded::BatchStarted(1),
            Recorded::BatchDone(1, 4),
            Recorded::BatchStarted(2),
            Recorded::BatchDone(2, 4),
        ]
    );
    assert_eq!(recorder.events().last(), Some(&Recorded::Completed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn item_failures_are_reported_without_stopping_the_pool() {
    let config = config().workers(3).batches(2).batch_size(5).build().unwrap();
    let recorder = Recorder::default();
    let summary = Pipeline::new(config)
        .with_processor(FailOdd)
        .with_observer(recorder.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed, 5);
    assert_eq!(summary.errored, 5);

    let mut failed: Vec<u64> = recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Recorded::Failed(id) => Some(id),
            _ => None,
        })
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, vec![1, 3, 5, 7, 9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simulated_failures_are_counted() {
    let config = config()
        .batches(1)
        .batch_size(12)
        .failure_rate(1.0)
        .build()
        .unwrap();

    let summary = Pipeline::new(config).run().await.unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.errored, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_items_time_out() {
    let config = config()
        .batches(1)
        .batch_size(4)
        .item_timeout(Duration::from_millis(10))
        .build()
        .unwrap();

    let summary = timeout(
        Duration::from_secs(2),
        Pipeline::new(config)
            .with_processor(Tracked::new(Duration::from_secs(10)))
            .run(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.errored, 4);
}

async fn cancel_after(times: usize) -> (CompletionSummary, usize) {
    let config = config()
        .until_cancelled()
        .admission_capacity(8)
        .batch_size(10)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).with_processor(Tracked::new(Duration::from_millis(2)));
    let gate = pipeline.gate().clone();
    let shutdown = pipeline.shutdown_handle();

    let run = tokio::spawn(pipeline.run());
    tokio::time::sleep(Duration::from_millis(30)).await;
    for _ in 0..times {
        shutdown.cancel();
    }

    let summary = timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    (summary, gate.outstanding())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelling_twice_matches_cancelling_once() {
    let (once, once_outstanding) = cancel_after(1).await;
    let (twice, twice_outstanding) = cancel_after(2).await;

    assert!(once.cancelled && twice.cancelled);
    assert_eq!(once_outstanding, 0);
    assert_eq!(twice_outstanding, 0);
    assert!(once.processed <= once.submitted);
    assert!(twice.processed <= twice.submitted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn external_token_drives_start() {
    let token = fanline::CancellationToken::new();
    let config = config().until_cancelled().batch_size(5).build().unwrap();

    let run = tokio::spawn(fanline::start(config, token.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let summary = timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(summary.cancelled);
}
