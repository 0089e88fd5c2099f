use std::sync::{Arc, Mutex};
use std::time::Duration;

use kira_media_tracker::anilist::MetadataClient;
use kira_media_tracker::config::EngineConfig;
use kira_media_tracker::domain::{CandidateMatch, MediaId, MediaStatus, Metadata, TrackedItem};
use kira_media_tracker::engine::{Orchestrator, Phase};
use kira_media_tracker::error::KiraError;
use kira_media_tracker::runtime::{Command, ProgressEvent, ProgressSink, QueueRuntime};
use kira_media_tracker::state::BackoffPolicy;
use kira_media_tracker::store::MemoryStore;

#[derive(Default)]
struct MockAniList {
    calls: Mutex<Vec<MediaId>>,
}

impl MetadataClient for MockAniList {
    fn fetch_metadata(&self, id: MediaId) -> Result<Option<Metadata>, KiraError> {
        self.calls.lock().unwrap().push(id);
        if id.get() == 404 {
            return Ok(None);
        }
        Ok(Some(Metadata {
            description: Some("fetched".to_string()),
            media_status: Some(MediaStatus::Releasing),
            ..Metadata::default()
        }))
    }

    fn search_by_title(&self, _title: &str) -> Result<Vec<CandidateMatch>, KiraError> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Default)]
struct CollectingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl ProgressSink for CollectingSink {
    fn event(&self, event: ProgressEvent) {
        self.lines.lock().unwrap().push(event.message);
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        backoff: BackoffPolicy {
            base_delay_ms: 10,
            first_failure_delay_ms: 50,
            repeat_failure_delay_ms: 20,
        },
        ..EngineConfig::default()
    }
}

fn loaded_engine(ids: &[u64], config: EngineConfig) -> Orchestrator<MemoryStore> {
    let items = ids
        .iter()
        .map(|id| TrackedItem::new(MediaId::new(*id), format!("Show {id}")))
        .collect();
    let mut engine = Orchestrator::new(MemoryStore::with_collection(items), config);
    engine.load();
    engine
}

#[test]
fn runtime_drains_queue_in_background() {
    let client = Arc::new(MockAniList::default());
    let sink = CollectingSink::default();
    let runtime = QueueRuntime::start(
        loaded_engine(&[1, 404, 3], fast_config()),
        client.clone(),
        sink.clone(),
        Duration::from_millis(5),
    );

    assert!(runtime.wait_until_settled(Duration::from_secs(10)));
    let status = runtime.snapshot().unwrap();
    runtime.shutdown();

    assert_eq!(status.phase, Phase::Idle);
    assert_eq!(status.unresolved, vec![MediaId::new(404)]);
    assert_eq!(status.last_batch.map(|batch| batch.current), Some(3));
    assert_eq!(
        *client.calls.lock().unwrap(),
        vec![MediaId::new(1), MediaId::new(404), MediaId::new(3)]
    );
    let lines = sink.lines.lock().unwrap();
    assert!(lines.iter().any(|line| line.contains("Fetch queue is empty")));
    assert!(lines.iter().all(|line| line.starts_with('[')));
}

#[test]
fn stop_command_halts_before_next_fetch() {
    let client = Arc::new(MockAniList::default());
    let config = EngineConfig {
        backoff: BackoffPolicy {
            base_delay_ms: 60_000,
            ..BackoffPolicy::default()
        },
        ..EngineConfig::default()
    };
    let runtime = QueueRuntime::start(
        loaded_engine(&[1, 2], config),
        client.clone(),
        CollectingSink::default(),
        Duration::from_millis(5),
    );

    runtime.send(Command::Stop);
    assert!(runtime.wait_until_settled(Duration::from_secs(5)));
    let phase = runtime.with_engine(|engine| engine.phase()).unwrap();
    runtime.shutdown();

    assert_eq!(phase, Phase::PausedStopped);
    assert!(client.calls.lock().unwrap().is_empty());
}
