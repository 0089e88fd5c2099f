use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// MyAnimeList id of a tracked entry. AniList lookups go through `idMal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(u64);

impl MediaId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MediaId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let trimmed = trimmed
            .strip_prefix("mal:")
            .or_else(|| trimmed.strip_prefix("MAL:"))
            .unwrap_or(trimmed);
        match trimmed.parse::<u64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(KiraError::InvalidMediaId(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Watching,
    Completed,
    OnHold,
    Dropped,
    #[default]
    PlanToWatch,
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchStatus::Watching => write!(f, "watching"),
            WatchStatus::Completed => write!(f, "completed"),
            WatchStatus::OnHold => write!(f, "on_hold"),
            WatchStatus::Dropped => write!(f, "dropped"),
            WatchStatus::PlanToWatch => write!(f, "plan_to_watch"),
        }
    }
}

/// Airing status as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
}

/// A partial metadata record. `None` fields leave the target untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_status: Option<MediaStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studios: Option<Vec<String>>,
}

impl Metadata {
    /// Field-wise overwrite of `self` with every field present in `other`.
    pub fn overlay(&mut self, other: &Metadata) {
        overwrite(&mut self.title, &other.title);
        overwrite(&mut self.description, &other.description);
        overwrite(&mut self.media_status, &other.media_status);
        overwrite(&mut self.poster_url, &other.poster_url);
        overwrite(&mut self.banner_url, &other.banner_url);
        overwrite(&mut self.total_episodes, &other.total_episodes);
        overwrite(&mut self.genres, &other.genres);
        overwrite(&mut self.season, &other.season);
        overwrite(&mut self.format, &other.format);
        overwrite(&mut self.average_score, &other.average_score);
        overwrite(&mut self.studios, &other.studios);
    }
}

fn overwrite<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: MediaId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default)]
    pub episodes_watched: u32,
    #[serde(default)]
    pub total_episodes: u32,
    #[serde(default)]
    pub status: WatchStatus,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_status: Option<MediaStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub studios: Vec<String>,
}

impl TrackedItem {
    pub fn new(id: MediaId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            poster_url: None,
            score: None,
            episodes_watched: 0,
            total_episodes: 0,
            status: WatchStatus::default(),
            genres: Vec::new(),
            season: None,
            description: None,
            media_status: None,
            banner_url: None,
            format: None,
            average_score: None,
            studios: Vec::new(),
        }
    }

    /// Builds a fresh item out of a remote record, e.g. a resolution candidate.
    pub fn from_metadata(id: MediaId, metadata: &Metadata) -> Self {
        let title = metadata
            .title
            .clone()
            .unwrap_or_else(|| format!("Anime ID {id}"));
        let mut item = Self::new(id, title);
        item.merge(metadata);
        item
    }

    /// Both the description and the airing status must be known.
    pub fn has_complete_metadata(&self) -> bool {
        self.description
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
            && self.media_status.is_some()
    }

    pub fn merge(&mut self, metadata: &Metadata) {
        if let Some(title) = &metadata.title {
            self.title = title.clone();
        }
        overwrite(&mut self.description, &metadata.description);
        overwrite(&mut self.media_status, &metadata.media_status);
        overwrite(&mut self.poster_url, &metadata.poster_url);
        overwrite(&mut self.banner_url, &metadata.banner_url);
        if let Some(total) = metadata.total_episodes {
            self.total_episodes = total;
        }
        if let Some(genres) = &metadata.genres {
            self.genres = genres.clone();
        }
        overwrite(&mut self.season, &metadata.season);
        overwrite(&mut self.format, &metadata.format);
        overwrite(&mut self.average_score, &metadata.average_score);
        if let Some(studios) = &metadata.studios {
            self.studios = studios.clone();
        }
    }

    /// Drops everything except identity, display basics and user-owned fields.
    pub fn strip_to_identity(&self) -> Self {
        Self {
            id: self.id,
            title: self.title.clone(),
            poster_url: self.poster_url.clone(),
            score: self.score,
            episodes_watched: self.episodes_watched,
            total_episodes: self.total_episodes,
            status: self.status,
            genres: self.genres.clone(),
            season: self.season.clone(),
            description: None,
            media_status: None,
            banner_url: None,
            format: None,
            average_score: None,
            studios: Vec::new(),
        }
    }

    /// Re-keys this record onto `candidate`, keeping what the user owns.
    pub fn resolved_with(&self, candidate: &CandidateMatch) -> Self {
        let mut resolved = TrackedItem::from_metadata(candidate.id, &candidate.metadata);
        resolved.title = candidate.title.clone();
        resolved.episodes_watched = self.episodes_watched;
        resolved.score = self.score;
        resolved.status = self.status;
        if self.season.is_some() {
            resolved.season = self.season.clone();
        }
        resolved
    }
}

/// A search hit offered to the user while resolving an unmatched entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub id: MediaId,
    pub title: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample_metadata() -> Metadata {
        Metadata {
            title: Some("Cowboy Bebop".to_string()),
            description: Some("Space bounty hunters.".to_string()),
            media_status: Some(MediaStatus::Finished),
            total_episodes: Some(26),
            genres: Some(vec!["Action".to_string(), "Sci-Fi".to_string()]),
            ..Metadata::default()
        }
    }

    #[test]
    fn parse_media_id_valid() {
        let id: MediaId = " 5114 ".parse().unwrap();
        assert_eq!(id.get(), 5114);
        let prefixed: MediaId = "mal:1".parse().unwrap();
        assert_eq!(prefixed, MediaId::new(1));
    }

    #[test]
    fn parse_media_id_invalid() {
        assert_matches!("0".parse::<MediaId>(), Err(KiraError::InvalidMediaId(_)));
        assert_matches!("abc".parse::<MediaId>(), Err(KiraError::InvalidMediaId(_)));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = TrackedItem::new(MediaId::new(1), "bebop");
        once.merge(&sample_metadata());
        let mut twice = once.clone();
        twice.merge(&sample_metadata());
        assert_eq!(once, twice);
        assert_eq!(once.title, "Cowboy Bebop");
        assert_eq!(once.total_episodes, 26);
    }

    #[test]
    fn merge_keeps_fields_missing_from_metadata() {
        let mut item = TrackedItem::new(MediaId::new(1), "bebop");
        item.poster_url = Some("poster.png".to_string());
        item.episodes_watched = 4;
        item.merge(&Metadata {
            description: Some("text".to_string()),
            ..Metadata::default()
        });
        assert_eq!(item.poster_url.as_deref(), Some("poster.png"));
        assert_eq!(item.episodes_watched, 4);
        assert_eq!(item.title, "bebop");
    }

    #[test]
    fn complete_metadata_requires_description_and_status() {
        let mut item = TrackedItem::new(MediaId::new(1), "bebop");
        assert!(!item.has_complete_metadata());
        item.description = Some("  ".to_string());
        item.media_status = Some(MediaStatus::Finished);
        assert!(!item.has_complete_metadata());
        item.description = Some("text".to_string());
        assert!(item.has_complete_metadata());
    }

    #[test]
    fn strip_keeps_user_fields() {
        let mut item = TrackedItem::new(MediaId::new(1), "bebop");
        item.merge(&sample_metadata());
        item.score = Some(9);
        item.episodes_watched = 12;
        let stripped = item.strip_to_identity();
        assert_eq!(stripped.score, Some(9));
        assert_eq!(stripped.episodes_watched, 12);
        assert_eq!(stripped.total_episodes, 26);
        assert!(stripped.description.is_none());
        assert!(stripped.media_status.is_none());
    }

    #[test]
    fn overlay_overwrites_present_fields_only() {
        let mut cached = sample_metadata();
        cached.overlay(&Metadata {
            description: Some("new".to_string()),
            ..Metadata::default()
        });
        assert_eq!(cached.description.as_deref(), Some("new"));
        assert_eq!(cached.total_episodes, Some(26));
    }
}
