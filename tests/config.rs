use std::io::Write;

use assert_matches::assert_matches;

use kira_media_tracker::config::{Config, ConfigLoader, QueueEntry};
use kira_media_tracker::error::KiraError;

#[test]
fn parse_config_queue_overrides() {
    let config = Config {
        data_dir: Some("/tmp/kira-mt".to_string()),
        queue: Some(QueueEntry {
            base_delay_ms: Some(500),
            min_rate_limit_secs: Some(0),
            ..QueueEntry::default()
        }),
        ..Config::default()
    };

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.engine.backoff.base_delay_ms, 500);
    assert_eq!(resolved.engine.backoff.first_failure_delay_ms, 30_000);
    assert_eq!(resolved.engine.backoff.repeat_failure_delay_ms, 10_000);
    assert_eq!(resolved.engine.min_rate_limit_secs, 1);
    assert_eq!(resolved.timeout.as_secs(), 30);
}

#[test]
fn resolve_reads_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "schema_version": 1,
            "data_dir": "/tmp/kira-mt-data",
            "anilist": {{ "endpoint": "http://localhost:9999", "timeout_secs": 5 }},
            "queue": {{ "repeat_failure_delay_ms": 15000, "log_capacity": 50 }}
        }}"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let resolved = ConfigLoader::resolve(Some(&path)).unwrap();
    assert_eq!(resolved.endpoint, "http://localhost:9999");
    assert_eq!(resolved.timeout.as_secs(), 5);
    assert_eq!(resolved.engine.backoff.repeat_failure_delay_ms, 15_000);
    assert_eq!(resolved.engine.log_capacity, 50);
    assert_eq!(resolved.data_dir.as_str(), "/tmp/kira-mt-data");
}

#[test]
fn explicit_missing_config_is_an_error() {
    let result = ConfigLoader::resolve(Some("/definitely/not/here/kira-mt.json"));
    assert_matches!(result, Err(KiraError::MissingConfig(_)));
}

#[test]
fn malformed_config_reports_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ \"queue\": 12 }}").unwrap();
    let path = file.path().to_str().unwrap().to_string();
    assert_matches!(
        ConfigLoader::resolve(Some(&path)),
        Err(KiraError::ConfigParse(_))
    );
}
