//! Wall-clock driver for the [`Orchestrator`].
//!
//! A driver thread owns the clock: it applies user commands, advances the engine by
//! the real elapsed time and hands dequeued jobs to a single fetch worker. The worker
//! performs the network call without holding the engine lock and posts the outcome
//! back to the driver, so at most one physical request is ever outstanding.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::anilist::MetadataClient;
use crate::domain::{CandidateMatch, MediaId, TrackedItem};
use crate::engine::{FetchJob, FetchOutcome, Orchestrator, Phase, StatusSnapshot};
use crate::store::Storage;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

/// Receives every new fetch-log line as it is written.
pub trait ProgressSink: Send {
    fn event(&self, event: ProgressEvent);
}

/// User intents accepted while the queue is running.
#[derive(Debug, Clone)]
pub enum Command {
    Refresh,
    Stop,
    Import(Vec<TrackedItem>),
    ClearCache,
    Resolve {
        id: MediaId,
        candidate: CandidateMatch,
    },
    Remove(MediaId),
    Add(TrackedItem),
    OpenDetail(MediaId),
    CloseDetail,
}

enum DriverMessage {
    Command(Command),
    Completed(FetchJob, FetchOutcome),
    Shutdown,
}

pub struct QueueRuntime<S: Storage + 'static> {
    engine: Arc<Mutex<Orchestrator<S>>>,
    messages: Sender<DriverMessage>,
    driver: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Storage + 'static> QueueRuntime<S> {
    pub fn start<C, P>(engine: Orchestrator<S>, client: C, sink: P, tick: Duration) -> Self
    where
        C: MetadataClient + 'static,
        P: ProgressSink + 'static,
    {
        let engine = Arc::new(Mutex::new(engine));
        let (messages, inbox) = mpsc::channel::<DriverMessage>();
        let (jobs, job_inbox) = mpsc::channel::<FetchJob>();

        let completions = messages.clone();
        let worker = thread::spawn(move || fetch_worker(client, job_inbox, completions));

        let driver_engine = engine.clone();
        let driver =
            thread::spawn(move || drive(driver_engine, inbox, jobs, Box::new(sink), tick));

        Self {
            engine,
            messages,
            driver: Some(driver),
            worker: Some(worker),
        }
    }

    pub fn send(&self, command: Command) {
        if self.messages.send(DriverMessage::Command(command)).is_err() {
            warn!("queue driver is no longer running");
        }
    }

    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        self.engine.lock().ok().map(|engine| engine.snapshot())
    }

    /// Runs `f` against the engine under its lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&Orchestrator<S>) -> R) -> Option<R> {
        self.engine.lock().ok().map(|engine| f(&engine))
    }

    /// Blocks until the queue rests (idle or stopped) or `timeout` elapses.
    /// Returns `true` when the queue came to rest.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let settled = self
                .with_engine(|engine| {
                    matches!(engine.phase(), Phase::Idle | Phase::PausedStopped)
                        && engine.queue().is_empty()
                })
                .unwrap_or(true);
            if settled {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    pub fn shutdown(mut self) {
        self.stop_threads();
    }

    fn stop_threads(&mut self) {
        let _ = self.messages.send(DriverMessage::Shutdown);
        if let Some(driver) = self.driver.take() {
            driver.join().ok();
        }
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
    }
}

impl<S: Storage + 'static> Drop for QueueRuntime<S> {
    fn drop(&mut self) {
        self.stop_threads();
    }
}

fn fetch_worker<C: MetadataClient>(
    client: C,
    jobs: Receiver<FetchJob>,
    completions: Sender<DriverMessage>,
) {
    for job in jobs {
        let started = Instant::now();
        let outcome = FetchOutcome::classify(client.fetch_metadata(job.id));
        debug!(id = %job.id, elapsed_ms = started.elapsed().as_millis() as u64, "fetch finished");
        if completions
            .send(DriverMessage::Completed(job, outcome))
            .is_err()
        {
            break;
        }
    }
}

fn drive<S: Storage>(
    engine: Arc<Mutex<Orchestrator<S>>>,
    inbox: Receiver<DriverMessage>,
    jobs: Sender<FetchJob>,
    sink: Box<dyn ProgressSink>,
    tick: Duration,
) {
    let started = Instant::now();
    let mut last = Instant::now();
    let mut seen = 0u64;

    loop {
        let message = match inbox.recv_timeout(tick) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if matches!(message, Some(DriverMessage::Shutdown)) {
            break;
        }

        let Ok(mut guard) = engine.lock() else {
            warn!("queue engine lock poisoned");
            break;
        };

        match message {
            Some(DriverMessage::Command(command)) => apply(&mut guard, command),
            Some(DriverMessage::Completed(job, outcome)) => guard.complete(job, outcome),
            Some(DriverMessage::Shutdown) | None => {}
        }

        let now = Instant::now();
        let job = guard.advance(now.duration_since(last));
        last = now;

        for entry in guard.log().since(seen) {
            sink.event(ProgressEvent {
                message: entry.line(),
                elapsed: Some(started.elapsed()),
            });
        }
        seen = guard.log().total_written();
        drop(guard);

        if let Some(job) = job {
            if jobs.send(job).is_err() {
                warn!("fetch worker is no longer running");
                break;
            }
        }
    }
}

fn apply<S: Storage>(engine: &mut Orchestrator<S>, command: Command) {
    match command {
        Command::Refresh => engine.refresh(),
        Command::Stop => engine.stop(),
        Command::Import(items) => engine.import_replaced(items),
        Command::ClearCache => engine.clear_cache(),
        Command::Resolve { id, candidate } => {
            if let Err(err) = engine.resolve(id, &candidate) {
                warn!(%id, error = %err, "resolution rejected");
            }
        }
        Command::Remove(id) => {
            engine.remove(id);
        }
        Command::Add(item) => {
            engine.add(item);
        }
        Command::OpenDetail(id) => {
            engine.open_detail(id);
        }
        Command::CloseDetail => engine.close_detail(),
    }
}
