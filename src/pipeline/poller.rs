// src/pipeline/poller.rs

//! Periodic poll loop.
//!
//! Each cycle walks `Idle → Fetching → Ingesting → Notifying → Idle`. A
//! failure while fetching or ingesting ends the cycle early; the schedule
//! itself never stops.
//!
//! Every listener owns one delivery worker fed through a queue, so batches
//! reach a listener one at a time and in cycle order even when a delivery
//! outlives the next tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};

use crate::error::Result;
use crate::models::{Announcement, parse_entries};
use crate::services::{AnnouncementListener, AnnouncementStore, StreamSource};
use crate::storage::AnnouncementStorage;

/// Phase of the poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Ingesting,
    Notifying,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollState::Idle => "idle",
            PollState::Fetching => "fetching",
            PollState::Ingesting => "ingesting",
            PollState::Notifying => "notifying",
        };
        f.write_str(name)
    }
}

/// Outcome of a single poll cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Entries found in the payload
    pub fetched: usize,
    /// Announcements added to the store
    pub inserted: usize,
    /// Announcements handed to listeners (now marked read)
    pub delivered: Vec<Announcement>,
    /// One delivery receipt per listener
    pub dispatched: Vec<oneshot::Receiver<()>>,
}

impl CycleReport {
    /// Wait until every listener finished with this cycle's batch.
    pub async fn wait_for_delivery(self) {
        for result in join_all(self.dispatched).await {
            if result.is_err() {
                log::error!("Delivery worker stopped before finishing a batch");
            }
        }
    }
}

/// A batch queued for one listener.
struct Delivery {
    batch: Arc<[Announcement]>,
    done: oneshot::Sender<()>,
}

/// A registered listener and the queue of its delivery worker.
///
/// The worker starts on the first batch and stops once the queue is
/// dropped and drained.
struct Subscriber {
    listener: Arc<dyn AnnouncementListener>,
    queue: Option<mpsc::UnboundedSender<Delivery>>,
}

impl Subscriber {
    fn new(listener: Arc<dyn AnnouncementListener>) -> Self {
        Self {
            listener,
            queue: None,
        }
    }

    fn enqueue(&mut self, batch: Arc<[Announcement]>) -> oneshot::Receiver<()> {
        let (done, receipt) = oneshot::channel();
        let queue = self
            .queue
            .get_or_insert_with(|| spawn_worker(Arc::clone(&self.listener)));

        if queue.send(Delivery { batch, done }).is_err() {
            // Worker died (listener panicked); the next batch gets a new one
            log::error!("Delivery worker for {} is gone", self.listener.name());
            self.queue = None;
        }
        receipt
    }
}

fn spawn_worker(listener: Arc<dyn AnnouncementListener>) -> mpsc::UnboundedSender<Delivery> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            if let Err(e) = listener.update(&delivery.batch).await {
                log::error!("Listener {} failed: {}", listener.name(), e);
            }
            let _ = delivery.done.send(());
        }
        log::debug!("Delivery worker for {} stopped", listener.name());
    });
    tx
}

/// Drives the source → store → listener flow on a fixed interval.
pub struct Poller {
    source: Box<dyn StreamSource>,
    store: AnnouncementStore,
    subscribers: Vec<Subscriber>,
    storage: Option<Arc<dyn AnnouncementStorage>>,
    interval: Duration,
    state: PollState,
}

impl Poller {
    /// Create a poller with an empty store.
    pub fn new(source: Box<dyn StreamSource>, interval: Duration) -> Self {
        Self {
            source,
            store: AnnouncementStore::new(),
            subscribers: Vec::new(),
            storage: None,
            interval,
            state: PollState::Idle,
        }
    }

    /// Start from an existing store (e.g. restored from disk).
    pub fn with_store(mut self, store: AnnouncementStore) -> Self {
        self.store = store;
        self
    }

    /// Save a snapshot after every cycle that changed the store.
    pub fn with_storage(mut self, storage: Arc<dyn AnnouncementStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn AnnouncementListener>) {
        self.subscribers.push(Subscriber::new(listener));
    }

    /// Unsubscribe a listener previously added. Returns whether it was found.
    ///
    /// Batches already queued for it are still delivered.
    pub fn remove_listener(&mut self, listener: &Arc<dyn AnnouncementListener>) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| !Arc::ptr_eq(&s.listener, listener));
        self.subscribers.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn store(&self) -> &AnnouncementStore {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll forever. The first cycle starts immediately.
    pub async fn run(&mut self) {
        log::info!(
            "Polling {} every {}s",
            self.source.describe(),
            self.interval.as_secs()
        );

        let mut ticker = time::interval(self.interval);
        // Late cycles catch up back to back, like a fixed-rate schedule
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Run one cycle and log its outcome. Delivery is not awaited.
    pub async fn tick(&mut self) {
        match self.run_cycle().await {
            Ok(report) => log::info!(
                "Cycle done: {} entries, {} new, {} delivered to {} listeners",
                report.fetched,
                report.inserted,
                report.delivered.len(),
                report.dispatched.len()
            ),
            Err(e) => log::error!("Poll cycle failed: {}", e),
        }
    }

    /// Fetch, ingest and hand unread announcements to every listener.
    ///
    /// Always leaves the poller `Idle`, also on error. On error nothing was
    /// ingested and no flag changed.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let result = self.advance().await;
        self.set_state(PollState::Idle);
        result
    }

    async fn advance(&mut self) -> Result<CycleReport> {
        self.set_state(PollState::Fetching);
        let payload = self.source.fetch().await?;

        self.set_state(PollState::Ingesting);
        let entries = parse_entries(&payload)?;
        let inserted = self.store.ingest(&entries);

        let mut report = CycleReport {
            fetched: entries.len(),
            inserted,
            ..CycleReport::default()
        };

        if self.store.has_unread() {
            self.set_state(PollState::Notifying);
            report.delivered = self.store.get_unread();
            report.dispatched = self.dispatch(&report.delivered);
        }

        if report.inserted > 0 || !report.delivered.is_empty() {
            self.persist().await;
        }

        Ok(report)
    }

    /// Queue the batch for every listener without waiting for delivery.
    ///
    /// Errors are logged by the worker; the announcements stay marked read
    /// either way.
    pub fn dispatch(&mut self, batch: &[Announcement]) -> Vec<oneshot::Receiver<()>> {
        if batch.is_empty() {
            return Vec::new();
        }

        let batch: Arc<[Announcement]> = batch.into();
        self.subscribers
            .iter_mut()
            .map(|subscriber| subscriber.enqueue(Arc::clone(&batch)))
            .collect()
    }

    async fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.save(&self.store.snapshot()).await {
            log::warn!("Failed to save announcement state: {}", e);
        }
    }

    fn set_state(&mut self, state: PollState) {
        if self.state != state {
            log::debug!("Poller {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::time::Instant;

    const FIXTURE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/stream.json"));

    /// Serves queued payloads, then repeats the last one.
    struct ScriptedSource {
        payloads: Mutex<Vec<std::result::Result<String, String>>>,
        fetched_at: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedSource {
        fn new(payloads: Vec<std::result::Result<&str, &str>>) -> Box<Self> {
            let mut payloads: Vec<_> = payloads
                .into_iter()
                .map(|p| p.map(String::from).map_err(String::from))
                .collect();
            payloads.reverse();
            Box::new(Self {
                payloads: Mutex::new(payloads),
                fetched_at: Arc::default(),
            })
        }
    }

    #[async_trait]
    impl StreamSource for ScriptedSource {
        async fn fetch(&self) -> Result<String> {
            self.fetched_at.lock().unwrap().push(Instant::now());
            let mut payloads = self.payloads.lock().unwrap();
            let next = if payloads.len() > 1 {
                payloads.pop().unwrap()
            } else {
                payloads[0].clone()
            };
            next.map_err(|e| AppError::fetch("scripted", e))
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    struct ChannelListener {
        tx: mpsc::UnboundedSender<Vec<String>>,
    }

    #[async_trait]
    impl AnnouncementListener for ChannelListener {
        async fn update(&self, announcements: &[Announcement]) -> Result<()> {
            let titles = announcements.iter().map(|a| a.title.clone()).collect();
            let _ = self.tx.send(titles);
            Ok(())
        }

        fn name(&self) -> &str {
            "channel"
        }
    }

    /// Records titles in arrival order, taking a while for "A".
    struct SlowListener {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AnnouncementListener for SlowListener {
        async fn update(&self, announcements: &[Announcement]) -> Result<()> {
            for a in announcements {
                if a.title == "A" {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                self.seen.lock().unwrap().push(a.title.clone());
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct FailingListener;

    #[async_trait]
    impl AnnouncementListener for FailingListener {
        async fn update(&self, _: &[Announcement]) -> Result<()> {
            Err(AppError::notify("test", "channel unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn poller(source: Box<ScriptedSource>) -> Poller {
        Poller::new(source, Duration::from_secs(60))
    }

    fn listener() -> (Arc<dyn AnnouncementListener>, mpsc::UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn AnnouncementListener> = Arc::new(ChannelListener { tx });
        (listener, rx)
    }

    fn payload(titles: &[&str]) -> String {
        let entries: Vec<_> = titles
            .iter()
            .map(|title| {
                serde_json::json!({
                    "se_id": title,
                    "itemSpecificData": {
                        "title": title,
                        "notificationDetails": { "announcementBody": "body" }
                    }
                })
            })
            .collect();
        serde_json::json!({ "sv_streamEntries": entries }).to_string()
    }

    #[tokio::test]
    async fn test_fixture_end_to_end() {
        let mut poller = poller(ScriptedSource::new(vec![Ok(FIXTURE)]));
        let (listener, mut rx) = listener();
        poller.add_listener(listener);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.fetched, 4);
        assert_eq!(report.inserted, 3);
        let titles: Vec<_> = report.delivered.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Exam registration open",
                "Lab 3 deadline extended",
                "Lecture notes uploaded"
            ]
        );
        report.wait_for_delivery().await;
        assert_eq!(rx.recv().await.unwrap().len(), 3);

        // Same payload again: nothing new, nothing delivered
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.inserted, 0);
        assert!(report.delivered.is_empty());
        assert!(report.dispatched.is_empty());
        assert_eq!(poller.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn test_fixture_fields() {
        let mut poller = poller(ScriptedSource::new(vec![Ok(FIXTURE)]));
        let report = poller.run_cycle().await.unwrap();

        let first = &report.delivered[0];
        assert_eq!(first.body, "Register before 1 February.");
        assert_eq!(first.author, "Ola Nordmann");
        assert_eq!(
            first.subject.as_deref(),
            Some("TDT4100 Object-Oriented Programming")
        );
        assert_eq!(report.delivered[2].author, "unknown");
        assert!(poller.store().announcements().iter().all(|a| a.read));
    }

    #[tokio::test]
    async fn test_slow_batch_is_not_overtaken() {
        let first = payload(&["A"]);
        let second = payload(&["A", "B"]);
        let source = ScriptedSource::new(vec![Ok(first.as_str()), Ok(second.as_str())]);
        let mut poller = poller(source);
        let seen = Arc::new(Mutex::new(Vec::new()));
        poller.add_listener(Arc::new(SlowListener { seen: seen.clone() }));

        // Second cycle fires while "A" is still being delivered
        let slow = poller.run_cycle().await.unwrap();
        let fast = poller.run_cycle().await.unwrap();
        assert_eq!(fast.delivered.len(), 1);

        fast.wait_for_delivery().await;
        assert_eq!(*seen.lock().unwrap(), ["A", "B"]);
        slow.wait_for_delivery().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_starts_immediately_and_survives_failed_cycle() {
        let source = ScriptedSource::new(vec![Err("bad gateway"), Ok(FIXTURE)]);
        let fetched_at = source.fetched_at.clone();
        let mut poller = poller(source);
        let (listener, mut rx) = listener();
        poller.add_listener(listener);

        let start = Instant::now();
        let task = tokio::spawn(async move { poller.run().await });

        // First tick failed at t=0; the next one still ingests the fixture
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.len(), 3);

        let fetched_at = fetched_at.lock().unwrap().clone();
        assert_eq!(fetched_at.len(), 2);
        assert_eq!(fetched_at[0] - start, Duration::ZERO);
        assert_eq!(fetched_at[1] - start, Duration::from_secs(60));

        task.abort();
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_schedule_and_store() {
        let mut poller = poller(ScriptedSource::new(vec![Err("timeout"), Ok(FIXTURE)]));

        let err = poller.run_cycle().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        assert_eq!(poller.state(), PollState::Idle);
        assert!(poller.store().is_empty());

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.inserted, 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_ingests_nothing() {
        let mut poller = poller(ScriptedSource::new(vec![Ok(r#"{"sv_streamEntries": [ {"#)]));

        let err = poller.run_cycle().await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
        assert!(poller.store().is_empty());
        assert_eq!(poller.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn test_listener_failure_still_marks_read() {
        let mut poller = poller(ScriptedSource::new(vec![Ok(FIXTURE)]));
        poller.add_listener(Arc::new(FailingListener));
        let (listener, mut rx) = listener();
        poller.add_listener(listener);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.dispatched.len(), 2);
        report.wait_for_delivery().await;

        assert_eq!(rx.recv().await.unwrap().len(), 3);
        assert!(!poller.store().has_unread());
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let mut poller = poller(ScriptedSource::new(vec![Ok(FIXTURE)]));
        let (listener, mut rx) = listener();
        poller.add_listener(Arc::clone(&listener));
        assert_eq!(poller.listener_count(), 1);

        assert!(poller.remove_listener(&listener));
        assert!(!poller.remove_listener(&listener));

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.delivered.len(), 3);
        assert!(report.dispatched.is_empty());
        drop(poller);
        drop(listener);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_state_is_saved_and_restored() {
        let tmp = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(tmp.path().join("state.json")));

        let mut first = poller(ScriptedSource::new(vec![Ok(FIXTURE)]))
            .with_storage(storage.clone());
        first.run_cycle().await.unwrap();

        let snapshot = storage.load().await.unwrap().unwrap();
        let mut second = poller(ScriptedSource::new(vec![Ok(FIXTURE)]))
            .with_store(AnnouncementStore::from_snapshot(snapshot));

        let report = second.run_cycle().await.unwrap();
        assert_eq!(report.inserted, 0);
        assert!(report.delivered.is_empty());
    }
}
