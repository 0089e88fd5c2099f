use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{CandidateMatch, MediaId, TrackedItem};
use crate::engine::StatusSnapshot;
use crate::runtime::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedEntry {
    pub id: MediaId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub settled: bool,
    pub status: StatusSnapshot,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_collection(items: &[TrackedItem]) -> io::Result<()> {
        Self::print_json(&items)
    }

    pub fn print_unresolved(entries: &[UnresolvedEntry]) -> io::Result<()> {
        Self::print_json(&entries)
    }

    pub fn print_candidates(candidates: &[CandidateMatch]) -> io::Result<()> {
        Self::print_json(&candidates)
    }

    pub fn print_item(item: &TrackedItem) -> io::Result<()> {
        Self::print_json(item)
    }

    pub fn print_status(status: &StatusSnapshot) -> io::Result<()> {
        Self::print_json(status)
    }

    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Mirrors fetch-log lines to stderr, keeping stdout for the JSON result.
pub struct StderrLog;

impl ProgressSink for StderrLog {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "{}", event.message);
    }
}
