use std::collections::VecDeque;

use chrono::Local;
use serde::Serialize;

pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
}

impl LogEntry {
    pub fn line(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }
}

/// Append-only list of user-visible queue events. Oldest lines fall off past capacity.
#[derive(Debug, Clone)]
pub struct FetchLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    total_written: u64,
}

impl Default for FetchLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl FetchLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            total_written: 0,
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        };
        tracing::debug!(target: "kira_mt::fetch_log", "{}", entry.message);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total_written += 1;
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::line).collect()
    }

    /// Entries written after the first `seen` ones, for incremental readers.
    pub fn since(&self, seen: u64) -> Vec<LogEntry> {
        let dropped = self.total_written - self.entries.len() as u64;
        let skip = seen.saturating_sub(dropped) as usize;
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.message.contains(needle))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_past_capacity() {
        let mut log = FetchLog::with_capacity(2);
        log.push("a");
        log.push("b");
        log.push("c");
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert_eq!(log.total_written(), 3);
    }

    #[test]
    fn since_skips_seen_entries_even_after_eviction() {
        let mut log = FetchLog::with_capacity(2);
        log.push("a");
        log.push("b");
        let seen = log.total_written();
        log.push("c");
        let fresh = log.since(seen);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "c");
        assert!(log.lines()[0].starts_with('['));
    }
}
