//! Single-flight background enrichment queue.
//!
//! The [`Orchestrator`] owns the pending queue, the in-flight gate, rate-limit and
//! backoff state and the progress read model. Time is explicit: a driver calls
//! [`Orchestrator::advance`] with elapsed wall time and receives at most one
//! [`FetchJob`]; the fetch result is handed back through [`Orchestrator::complete`].
//! Every mutation ends in [`Orchestrator::reevaluate`], which decides whether to arm
//! the next delayed dequeue, pause, or rest.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::anilist::MetadataClient;
use crate::config::EngineConfig;
use crate::domain::{CandidateMatch, MediaId, Metadata, TrackedItem};
use crate::error::KiraError;
use crate::fetch_log::FetchLog;
use crate::queue::{PendingQueue, UnresolvedSet, missing_metadata_ids};
use crate::state::{BackoffState, NetworkErrorState, ProgressState, RateLimitState};
use crate::store::{MetadataCache, Storage};

/// Classified result of a single remote lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Metadata),
    NotFound,
    RateLimited { retry_after: u64 },
    OtherError(String),
}

impl FetchOutcome {
    pub fn classify(result: Result<Option<Metadata>, KiraError>) -> Self {
        match result {
            Ok(Some(metadata)) => FetchOutcome::Success(metadata),
            Ok(None) => FetchOutcome::NotFound,
            Err(KiraError::RateLimited { retry_after }) => {
                FetchOutcome::RateLimited { retry_after }
            }
            Err(KiraError::AniListStatus { status: 429, .. }) => {
                FetchOutcome::RateLimited { retry_after: 0 }
            }
            Err(err) => FetchOutcome::OtherError(err.to_string()),
        }
    }
}

/// A dequeued id awaiting its network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub id: MediaId,
    pub title: String,
    epoch: u64,
}

impl FetchJob {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Scheduled,
    InFlight,
    PausedRateLimit,
    PausedStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedDequeue {
    delay_ms: u64,
    remaining_ms: u64,
}

/// Serializable view of everything an observer may show.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub progress: ProgressState,
    pub last_batch: Option<ProgressState>,
    pub rate_limit: RateLimitState,
    pub network_error: NetworkErrorState,
    pub current_delay_ms: u64,
    pub queue_len: usize,
    pub in_flight: Option<MediaId>,
    pub unresolved: Vec<MediaId>,
    pub tracked: usize,
}

pub struct Orchestrator<S: Storage> {
    store: S,
    config: EngineConfig,
    collection: Vec<TrackedItem>,
    metadata_cache: MetadataCache,
    unresolved: UnresolvedSet,
    queue: PendingQueue,
    in_flight: Option<MediaId>,
    rate_limit: RateLimitState,
    backoff: BackoffState,
    progress: ProgressState,
    last_batch: Option<ProgressState>,
    log: FetchLog,
    timer: Option<ArmedDequeue>,
    epoch: u64,
    initial_populated: bool,
    stopped: bool,
    detail: Option<TrackedItem>,
}

impl<S: Storage> Orchestrator<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            collection: Vec::new(),
            metadata_cache: MetadataCache::new(),
            unresolved: UnresolvedSet::new(),
            queue: PendingQueue::new(),
            in_flight: None,
            rate_limit: RateLimitState::default(),
            backoff: BackoffState::new(config.backoff),
            progress: ProgressState::default(),
            last_batch: None,
            log: FetchLog::with_capacity(config.log_capacity),
            timer: None,
            epoch: 0,
            initial_populated: false,
            stopped: false,
            detail: None,
        }
    }

    /// Loads persisted state and runs the one-shot initial population.
    pub fn load(&mut self) {
        self.collection = self.store.load_collection().unwrap_or_default();
        self.unresolved = self.store.load_unresolved();
        self.metadata_cache = self.store.load_metadata_cache();
        info!(
            tracked = self.collection.len(),
            unresolved = self.unresolved.len(),
            "collection loaded"
        );
        self.populate_initial();
        self.reevaluate();
    }

    fn populate_initial(&mut self) {
        if self.initial_populated {
            return;
        }
        let ids = self.auto_fetch_candidates();
        if !ids.is_empty() {
            self.log
                .push(format!("Initial queue populated with {} items.", ids.len()));
            self.queue.replace(ids);
        }
        self.initial_populated = true;
    }

    // Unresolved ids wait for manual resolution and are never auto-queued.
    fn auto_fetch_candidates(&self) -> Vec<MediaId> {
        missing_metadata_ids(&self.collection)
            .into_iter()
            .filter(|id| !self.unresolved.contains(*id))
            .collect()
    }

    // ---- commands -------------------------------------------------------

    /// Queues newly discovered gaps ahead of the existing backlog and lifts any pause.
    pub fn refresh(&mut self) {
        self.log
            .push("Manual refresh triggered. Checking for missing data...");
        let missing = self.auto_fetch_candidates();
        let added = self.queue.prepend_new(&missing);
        if added > 0 {
            self.log.push(format!(
                "Added {added} new item(s) to the fetch queue. Total: {}.",
                self.queue.len()
            ));
        } else {
            self.log.push("No new items to fetch.");
        }
        self.rate_limit.clear();
        self.backoff.reset();
        self.stopped = false;
        self.log.push(
            "Fetch queue state reset. Processing will resume if items are available.",
        );
        self.reevaluate();
    }

    /// Unconditional abort: drops the backlog and every pause or backoff.
    pub fn stop(&mut self) {
        self.log
            .push("Stop request received. Clearing queue and halting process.");
        self.hard_reset();
        self.stopped = true;
        info!(epoch = self.epoch, "queue stopped");
        self.reevaluate();
    }

    /// Replaces the collection wholesale and restarts population from scratch.
    pub fn import_replaced(&mut self, items: Vec<TrackedItem>) {
        let mut merged = items;
        for item in &mut merged {
            if let Some(cached) = self.metadata_cache.get(&item.id) {
                item.merge(cached);
            }
        }
        self.collection = merged;
        self.store.save_collection(&self.collection);
        self.hard_reset();
        self.stopped = false;
        self.unresolved.clear();
        self.store.save_unresolved(&self.unresolved);
        self.refresh_detail();
        self.initial_populated = false;
        self.log.push(
            "List imported. Fetch queue and unresolved list reset. Rate limit cleared.",
        );
        self.populate_initial();
        self.reevaluate();
    }

    /// Strips fetched metadata from every item and re-queues the whole collection.
    pub fn clear_cache(&mut self) {
        self.log
            .push("Clearing details cache and unresolved IDs...");
        self.metadata_cache.clear();
        self.store.save_metadata_cache(&self.metadata_cache);
        self.unresolved.clear();
        self.store.save_unresolved(&self.unresolved);
        self.collection = self
            .collection
            .iter()
            .map(TrackedItem::strip_to_identity)
            .collect();
        self.store.save_collection(&self.collection);
        self.hard_reset();
        self.stopped = false;
        self.refresh_detail();
        let ids: Vec<MediaId> = self.collection.iter().map(|item| item.id).collect();
        self.log.push(format!(
            "Details cache cleared. Re-populating fetch queue with {} items.",
            ids.len()
        ));
        self.queue.replace(ids);
        self.reevaluate();
    }

    /// Searches the remote service for matches to a tracked item's title.
    pub fn candidates<C: MetadataClient + ?Sized>(
        &mut self,
        id: MediaId,
        client: &C,
    ) -> Result<Vec<CandidateMatch>, KiraError> {
        let title = self
            .find(id)
            .map(|item| item.title.clone())
            .ok_or_else(|| KiraError::NotTracked(id.to_string()))?;
        self.log
            .push(format!("Searching for matches for \"{title}\"..."));
        match client.search_by_title(&title) {
            Ok(found) => {
                self.log.push(format!(
                    "Found {} candidate(s) for \"{title}\".",
                    found.len()
                ));
                Ok(found)
            }
            Err(KiraError::RateLimited { retry_after }) => {
                self.engage_rate_limit(retry_after);
                self.reevaluate();
                Err(KiraError::RateLimited { retry_after })
            }
            Err(err) => {
                self.log.push(format!("Search failed: {err}"));
                Err(err)
            }
        }
    }

    /// Re-keys an unresolved item onto the chosen candidate, keeping user-owned fields.
    pub fn resolve(
        &mut self,
        id: MediaId,
        candidate: &CandidateMatch,
    ) -> Result<TrackedItem, KiraError> {
        let original = self
            .find(id)
            .cloned()
            .ok_or_else(|| KiraError::NotTracked(id.to_string()))?;
        if !self.unresolved.contains(id) {
            return Err(KiraError::NotUnresolved(id.to_string()));
        }
        if candidate.id != id && self.find(candidate.id).is_some() {
            return Err(KiraError::AlreadyTracked(candidate.id.to_string()));
        }

        let resolved = original.resolved_with(candidate);
        self.collection.retain(|item| item.id != id);
        self.collection.insert(0, resolved.clone());
        self.store.save_collection(&self.collection);

        self.metadata_cache
            .entry(candidate.id)
            .or_default()
            .overlay(&candidate.metadata);
        self.store.save_metadata_cache(&self.metadata_cache);

        self.unresolved.remove(id);
        self.unresolved.remove(candidate.id);
        self.store.save_unresolved(&self.unresolved);
        self.queue.remove_all(id);

        if self.detail.as_ref().is_some_and(|open| open.id == id) {
            self.detail = Some(resolved.clone());
        }

        self.log.push(format!(
            "Resolved: Matched \"{}\" to \"{}\" (MAL ID: {}).",
            original.title, resolved.title, resolved.id
        ));
        self.reevaluate();
        Ok(resolved)
    }

    /// Deletes an item along with its unresolved and queued entries.
    pub fn remove(&mut self, id: MediaId) -> bool {
        let Some(position) = self.collection.iter().position(|item| item.id == id) else {
            return false;
        };
        let removed = self.collection.remove(position);
        self.store.save_collection(&self.collection);
        if self.unresolved.remove(id) {
            self.store.save_unresolved(&self.unresolved);
        }
        self.queue.remove_all(id);
        if self.detail.as_ref().is_some_and(|open| open.id == id) {
            self.detail = None;
        }
        self.log
            .push(format!("Removed \"{}\" from the collection.", removed.title));
        self.reevaluate();
        true
    }

    /// Adds a new item at the top of the collection. It is queued on the next refresh.
    pub fn add(&mut self, item: TrackedItem) -> bool {
        if self.find(item.id).is_some() {
            warn!(id = %item.id, "item already tracked");
            return false;
        }
        self.log
            .push(format!("Added \"{}\" to the collection.", item.title));
        self.collection.insert(0, item);
        self.store.save_collection(&self.collection);
        true
    }

    pub fn open_detail(&mut self, id: MediaId) -> Option<&TrackedItem> {
        self.detail = self.find(id).cloned();
        self.detail.as_ref()
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    // ---- state machine --------------------------------------------------

    /// Decides the queue's next action. Safe to call any number of times.
    pub fn reevaluate(&mut self) {
        self.timer = None;

        if self.rate_limit.active {
            self.progress.active = false;
            return;
        }

        // The last popped item is still in flight; its completion re-evaluates.
        if self.in_flight.is_some() {
            return;
        }

        if self.queue.is_empty() {
            if self.progress.active || self.progress.total > 0 {
                self.last_batch = Some(ProgressState {
                    fetching_title: String::new(),
                    active: false,
                    ..self.progress.clone()
                });
                self.progress = ProgressState::default();
                self.log.push("Fetch queue is empty, processing finished.");
                info!("fetch queue drained");
            }
            self.backoff.reset();
            return;
        }

        self.stopped = false;
        let delay_ms = self.backoff.current_delay_ms;
        if !self.progress.active {
            if self.progress.total > 0 {
                self.progress.active = true;
                self.progress.total = self
                    .progress
                    .total
                    .max(self.progress.current + self.queue.len());
                self.log.push(format!(
                    "Resuming background fetch ({} item(s) remaining).",
                    self.queue.len()
                ));
            } else {
                self.progress = ProgressState::start(self.queue.len());
                self.log.push(format!(
                    "Starting background fetch for {} item(s).",
                    self.queue.len()
                ));
            }
        } else {
            self.progress.total = self
                .progress
                .total
                .max(self.progress.current + self.queue.len());
            if self.backoff.is_escalated() {
                self.log.push(format!(
                    "Rescheduling next queue item with increased delay ({} seconds).",
                    delay_ms / 1000
                ));
            } else {
                self.log.push(format!(
                    "Scheduling next queue item processing (delaying {} seconds)...",
                    delay_ms / 1000
                ));
            }
        }

        debug!(delay_ms, queue = self.queue.len(), "dequeue armed");
        self.timer = Some(ArmedDequeue {
            delay_ms,
            remaining_ms: delay_ms,
        });
    }

    /// Advances virtual time: countdowns tick and the armed dequeue may fire.
    /// Returns the job to fetch when one was dequeued; leftover time is dropped.
    pub fn advance(&mut self, elapsed: Duration) -> Option<FetchJob> {
        let mut remaining = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        loop {
            if self.timer.is_some_and(|timer| timer.remaining_ms == 0) {
                if let Some(job) = self.fire() {
                    return Some(job);
                }
                continue;
            }
            if remaining == 0 {
                return None;
            }

            let mut step = remaining;
            if let Some(ms) = self.rate_limit.ms_until_tick() {
                step = step.min(ms);
            }
            if !self.rate_limit.active {
                if let Some(ms) = self.backoff.network_error.ms_until_tick() {
                    step = step.min(ms);
                }
            }
            if let Some(timer) = &self.timer {
                step = step.min(timer.remaining_ms);
            }

            remaining -= step;
            if let Some(timer) = self.timer.as_mut() {
                timer.remaining_ms -= step;
            }
            if !self.rate_limit.active {
                self.backoff.network_error.elapse(step);
            }
            if self.rate_limit.elapse(step) {
                self.log.push("Rate limit lifted. Resuming queue.");
                info!("rate limit lifted");
                self.reevaluate();
            }
        }
    }

    fn fire(&mut self) -> Option<FetchJob> {
        self.timer = None;
        if self.rate_limit.active || self.queue.is_empty() || self.in_flight.is_some() {
            self.log
                .push("Skipping scheduled processing due to changed conditions after delay.");
            return None;
        }
        let id = self.queue.pop_front()?;
        self.in_flight = Some(id);
        let title = self.title_of(id);
        self.progress.fetching_title = title.clone();
        self.log.push(format!("Fetching details for \"{title}\"..."));

        if self.find(id).is_some_and(TrackedItem::has_complete_metadata) {
            self.log
                .push(format!("Details already exist for \"{title}\". Skipping."));
            self.in_flight = None;
            self.mark_processed();
            self.reevaluate();
            return None;
        }

        Some(FetchJob {
            id,
            title,
            epoch: self.epoch,
        })
    }

    /// Applies the outcome of a job handed out by [`Orchestrator::advance`].
    ///
    /// Jobs from before a stop, import or cache clear still merge their data, but
    /// their failures no longer requeue, back off or pause the current run.
    pub fn complete(&mut self, job: FetchJob, outcome: FetchOutcome) {
        let stale = job.epoch != self.epoch;
        if !stale && self.in_flight == Some(job.id) {
            self.in_flight = None;
        }
        let title = job.title.as_str();

        match outcome {
            FetchOutcome::Success(metadata) => {
                self.apply_success(job.id, &metadata);
                let shown = metadata.title.as_deref().unwrap_or(title);
                self.log
                    .push(format!("Success: Fetched details for \"{shown}\"."));
                if !stale {
                    self.mark_processed();
                }
            }
            FetchOutcome::NotFound => {
                // Removed items never park in the unresolved set.
                if self.find(job.id).is_some() {
                    if self.unresolved.insert(job.id) {
                        self.store.save_unresolved(&self.unresolved);
                    }
                    self.queue.remove_all(job.id);
                }
                self.log.push(format!(
                    "Resolution needed: No AniList entry found for \"{title}\" (MAL ID: {}).",
                    job.id
                ));
                if !stale {
                    self.mark_processed();
                }
            }
            FetchOutcome::RateLimited { retry_after } => {
                if stale {
                    self.log.push(format!(
                        "Discarded rate-limit response for \"{title}\" from a stopped run."
                    ));
                } else {
                    self.queue.push_front(job.id);
                    self.engage_rate_limit(retry_after);
                }
            }
            FetchOutcome::OtherError(message) => {
                self.log
                    .push(format!("API Error: {message}. Retrying with delay."));
                if !stale {
                    self.queue.push_front(job.id);
                    let delay_ms = self.backoff.escalate();
                    self.log.push(format!(
                        "Re-queued \"{title}\" due to error. Increasing retry delay to {} seconds.",
                        delay_ms / 1000
                    ));
                    warn!(id = %job.id, delay_ms, "transient fetch failure");
                }
            }
        }

        self.reevaluate();
    }

    /// Performs the network call for `job` on the current thread and applies it.
    pub fn run_job<C: MetadataClient + ?Sized>(&mut self, client: &C, job: FetchJob) {
        let outcome = FetchOutcome::classify(client.fetch_metadata(job.id));
        self.complete(job, outcome);
    }

    /// Advances time and runs any dequeued job inline. Returns `true` when a fetch ran.
    pub fn step<C: MetadataClient + ?Sized>(&mut self, client: &C, elapsed: Duration) -> bool {
        match self.advance(elapsed) {
            Some(job) => {
                self.run_job(client, job);
                true
            }
            None => false,
        }
    }

    fn mark_processed(&mut self) {
        if self.backoff.is_escalated() {
            self.log.push("Successful fetch. Resetting fetch delay.");
        }
        self.backoff.reset();
        self.progress.current += 1;
    }

    fn engage_rate_limit(&mut self, retry_after: u64) {
        if self.rate_limit.active {
            return;
        }
        let seconds = if retry_after > 0 {
            retry_after
        } else {
            self.config.min_rate_limit_secs.max(1)
        };
        self.rate_limit.engage(seconds);
        self.log
            .push(format!("Rate limit hit. Pausing queue for {seconds} seconds."));
        self.log.push(format!(
            "Queue processing paused due to rate limit. Resuming in {seconds} seconds."
        ));
        warn!(seconds, "rate limit engaged");
    }

    fn apply_success(&mut self, id: MediaId, metadata: &Metadata) {
        let Some(item) = self.collection.iter_mut().find(|item| item.id == id) else {
            debug!(%id, "fetched item is no longer tracked");
            return;
        };
        item.merge(metadata);
        self.store.save_collection(&self.collection);

        self.metadata_cache
            .entry(id)
            .or_default()
            .overlay(metadata);
        self.store.save_metadata_cache(&self.metadata_cache);

        if let Some(open) = self.detail.as_mut().filter(|open| open.id == id) {
            open.merge(metadata);
        }
        if self.unresolved.remove(id) {
            self.store.save_unresolved(&self.unresolved);
        }
    }

    fn hard_reset(&mut self) {
        self.queue.clear();
        self.timer = None;
        self.in_flight = None;
        self.progress = ProgressState::default();
        self.rate_limit.clear();
        self.backoff.reset();
        self.epoch += 1;
    }

    fn refresh_detail(&mut self) {
        let open_id = self.detail.as_ref().map(|open| open.id);
        self.detail = open_id.and_then(|id| self.find(id).cloned());
    }

    fn find(&self, id: MediaId) -> Option<&TrackedItem> {
        self.collection.iter().find(|item| item.id == id)
    }

    fn title_of(&self, id: MediaId) -> String {
        self.find(id)
            .map(|item| item.title.clone())
            .unwrap_or_else(|| format!("Anime ID {id}"))
    }

    // ---- read models ----------------------------------------------------

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Final counters of the most recently drained batch.
    pub fn last_batch(&self) -> Option<&ProgressState> {
        self.last_batch.as_ref()
    }

    pub fn log(&self) -> &FetchLog {
        &self.log
    }

    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    pub fn network_error(&self) -> &NetworkErrorState {
        &self.backoff.network_error
    }

    pub fn backoff(&self) -> &BackoffState {
        &self.backoff
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn unresolved(&self) -> &UnresolvedSet {
        &self.unresolved
    }

    pub fn collection(&self) -> &[TrackedItem] {
        &self.collection
    }

    pub fn item(&self, id: MediaId) -> Option<&TrackedItem> {
        self.find(id)
    }

    pub fn detail(&self) -> Option<&TrackedItem> {
        self.detail.as_ref()
    }

    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata_cache
    }

    pub fn in_flight(&self) -> Option<MediaId> {
        self.in_flight
    }

    /// Full delay of the currently armed dequeue, if any.
    pub fn scheduled_delay_ms(&self) -> Option<u64> {
        self.timer.map(|timer| timer.delay_ms)
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::InFlight
        } else if self.rate_limit.active {
            Phase::PausedRateLimit
        } else if self.timer.is_some() {
            Phase::Scheduled
        } else if self.stopped {
            Phase::PausedStopped
        } else {
            Phase::Idle
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.phase(),
            progress: self.progress.clone(),
            last_batch: self.last_batch.clone(),
            rate_limit: self.rate_limit.clone(),
            network_error: self.backoff.network_error.clone(),
            current_delay_ms: self.backoff.current_delay_ms,
            queue_len: self.queue.len(),
            in_flight: self.in_flight,
            unresolved: self.unresolved.iter().collect(),
            tracked: self.collection.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::store::MemoryStore;

    fn orchestrator(ids: &[u64]) -> Orchestrator<MemoryStore> {
        let items = ids
            .iter()
            .map(|id| TrackedItem::new(MediaId::new(*id), format!("title-{id}")))
            .collect();
        let mut engine = Orchestrator::new(MemoryStore::with_collection(items), EngineConfig::default());
        engine.load();
        engine
    }

    #[test]
    fn classify_maps_client_results() {
        assert_matches!(FetchOutcome::classify(Ok(None)), FetchOutcome::NotFound);
        assert_matches!(
            FetchOutcome::classify(Err(KiraError::RateLimited { retry_after: 7 })),
            FetchOutcome::RateLimited { retry_after: 7 }
        );
        assert_matches!(
            FetchOutcome::classify(Err(KiraError::AniListHttp("reset".to_string()))),
            FetchOutcome::OtherError(_)
        );
    }

    #[test]
    fn load_arms_first_dequeue_with_base_delay() {
        let engine = orchestrator(&[1, 2]);
        assert_eq!(engine.phase(), Phase::Scheduled);
        assert_eq!(engine.scheduled_delay_ms(), Some(2_000));
        assert_eq!(engine.progress().total, 2);
        assert!(engine.progress().active);
    }

    #[test]
    fn timer_does_not_fire_early() {
        let mut engine = orchestrator(&[1]);
        assert!(engine.advance(Duration::from_millis(1_999)).is_none());
        let job = engine.advance(Duration::from_millis(1)).unwrap();
        assert_eq!(job.id, MediaId::new(1));
        assert_eq!(engine.phase(), Phase::InFlight);
        assert_eq!(engine.progress().fetching_title, "title-1");
    }

    #[test]
    fn redundant_reevaluate_keeps_single_timer() {
        let mut engine = orchestrator(&[1]);
        engine.reevaluate();
        engine.reevaluate();
        assert_eq!(engine.scheduled_delay_ms(), Some(2_000));
        let job = engine.advance(Duration::from_secs(2)).unwrap();
        assert!(engine.advance(Duration::from_secs(10)).is_none());
        engine.complete(job, FetchOutcome::NotFound);
        assert_eq!(engine.phase(), Phase::Idle);
    }
}
