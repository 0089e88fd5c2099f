use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::DEFAULT_ANILIST_ENDPOINT;
use crate::domain::{CandidateMatch, MediaId, MediaStatus, Metadata};
use crate::error::KiraError;

const SEARCH_PAGE_SIZE: u32 = 10;

const MEDIA_FIELDS: &str = "idMal title { romaji english } description(asHtml: false) status \
     coverImage { large } bannerImage episodes genres season seasonYear format averageScore \
     studios(isMain: true) { nodes { name } }";

/// Remote metadata source. `Ok(None)` from `fetch_metadata` is an authoritative "no match".
pub trait MetadataClient: Send + Sync {
    fn fetch_metadata(&self, id: MediaId) -> Result<Option<Metadata>, KiraError>;
    fn search_by_title(&self, title: &str) -> Result<Vec<CandidateMatch>, KiraError>;
}

impl<T: MetadataClient + ?Sized> MetadataClient for Arc<T> {
    fn fetch_metadata(&self, id: MediaId) -> Result<Option<Metadata>, KiraError> {
        (**self).fetch_metadata(id)
    }

    fn search_by_title(&self, title: &str) -> Result<Vec<CandidateMatch>, KiraError> {
        (**self).search_by_title(title)
    }
}

#[derive(Clone)]
pub struct AniListHttpClient {
    client: Client,
    endpoint: String,
}

impl AniListHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_endpoint(DEFAULT_ANILIST_ENDPOINT, Duration::from_secs(30))
    }

    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-mt/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::AniListHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::AniListHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "AniList request failed".to_string());
        Err(KiraError::AniListStatus { status, message })
    }

    /// Posts one GraphQL query. `Ok(None)` means the service answered "not found".
    fn post_query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>, KiraError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|err| KiraError::AniListHttp(err.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "anilist.request");
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(parse_retry_after)
                .unwrap_or(0);
            return Err(KiraError::RateLimited { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::handle_status(response)?;
        let envelope: GraphQlResponse<T> = response
            .json()
            .map_err(|err| KiraError::AniListHttp(err.to_string()))?;
        if !envelope.errors.is_empty() {
            if envelope.errors.iter().any(|err| err.status == Some(404)) {
                return Ok(None);
            }
            if envelope.errors.iter().any(|err| err.status == Some(429)) {
                return Err(KiraError::RateLimited { retry_after: 0 });
            }
            let message = envelope
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(KiraError::AniListQuery(message));
        }
        Ok(envelope.data)
    }
}

impl MetadataClient for AniListHttpClient {
    fn fetch_metadata(&self, id: MediaId) -> Result<Option<Metadata>, KiraError> {
        let query = format!(
            "query ($idMal: Int) {{ Media(idMal: $idMal, type: ANIME) {{ {MEDIA_FIELDS} }} }}"
        );
        let data: Option<MediaData> = self.post_query(&query, json!({ "idMal": id.get() }))?;
        Ok(data.and_then(|data| data.media).map(|media| media.into_metadata()))
    }

    fn search_by_title(&self, title: &str) -> Result<Vec<CandidateMatch>, KiraError> {
        let query = format!(
            "query ($search: String) {{ Page(perPage: {SEARCH_PAGE_SIZE}) {{ \
             media(search: $search, type: ANIME) {{ {MEDIA_FIELDS} }} }} }}"
        );
        let data: Option<PageData> = self.post_query(&query, json!({ "search": title }))?;
        let media = data.map(|data| data.page.media).unwrap_or_default();
        Ok(media.into_iter().filter_map(AniListMedia::into_candidate).collect())
    }
}

/// Retry-After may be delta-seconds or an HTTP date; dates fall back to 0.
pub fn parse_retry_after(value: &str) -> u64 {
    value.trim().parse::<u64>().unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<AniListMedia>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: PageMedia,
}

#[derive(Debug, Deserialize)]
struct PageMedia {
    #[serde(default)]
    media: Vec<AniListMedia>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniListMedia {
    id_mal: Option<u64>,
    title: Option<AniListTitle>,
    description: Option<String>,
    status: Option<MediaStatus>,
    cover_image: Option<AniListCover>,
    banner_image: Option<String>,
    episodes: Option<u32>,
    genres: Option<Vec<String>>,
    season: Option<String>,
    season_year: Option<u32>,
    format: Option<String>,
    average_score: Option<u8>,
    studios: Option<AniListStudios>,
}

#[derive(Debug, Deserialize)]
struct AniListTitle {
    romaji: Option<String>,
    english: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AniListCover {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AniListStudios {
    #[serde(default)]
    nodes: Vec<AniListStudio>,
}

#[derive(Debug, Deserialize)]
struct AniListStudio {
    name: String,
}

impl AniListMedia {
    fn into_metadata(self) -> Metadata {
        let title = self
            .title
            .and_then(|title| title.english.or(title.romaji));
        let season = match (self.season, self.season_year) {
            (Some(season), Some(year)) => Some(format!("{} {year}", capitalize(&season))),
            (Some(season), None) => Some(capitalize(&season)),
            (None, Some(year)) => Some(year.to_string()),
            (None, None) => None,
        };
        Metadata {
            title,
            description: self.description.map(|text| strip_markup(&text)),
            media_status: self.status,
            poster_url: self.cover_image.and_then(|cover| cover.large),
            banner_url: self.banner_image,
            total_episodes: self.episodes,
            genres: self.genres,
            season,
            format: self.format,
            average_score: self.average_score,
            studios: self
                .studios
                .map(|studios| studios.nodes.into_iter().map(|node| node.name).collect()),
        }
    }

    fn into_candidate(self) -> Option<CandidateMatch> {
        let id = MediaId::new(self.id_mal?);
        let metadata = self.into_metadata();
        let title = metadata
            .title
            .clone()
            .unwrap_or_else(|| format!("Anime ID {id}"));
        Some(CandidateMatch {
            id,
            title,
            metadata,
        })
    }
}

fn capitalize(value: &str) -> String {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("tag pattern"));

fn strip_markup(text: &str) -> String {
    let text = LINE_BREAK.replace_all(text, "\n");
    TAG.replace_all(&text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_maps_to_metadata() {
        let raw = json!({
            "idMal": 1,
            "title": { "romaji": "Kaubooi Bibappu", "english": "Cowboy Bebop" },
            "description": "Space <i>bounty</i> hunters.<br>In 2071.",
            "status": "FINISHED",
            "coverImage": { "large": "https://img/1.jpg" },
            "episodes": 26,
            "genres": ["Action"],
            "season": "SPRING",
            "seasonYear": 1998,
            "averageScore": 86,
            "studios": { "nodes": [{ "name": "Sunrise" }] }
        });
        let media: AniListMedia = serde_json::from_value(raw).unwrap();
        let candidate = media.into_candidate().unwrap();
        assert_eq!(candidate.id, MediaId::new(1));
        assert_eq!(candidate.title, "Cowboy Bebop");
        let meta = candidate.metadata;
        assert_eq!(meta.media_status, Some(MediaStatus::Finished));
        assert_eq!(meta.description.as_deref(), Some("Space bounty hunters.\nIn 2071."));
        assert_eq!(meta.season.as_deref(), Some("Spring 1998"));
        assert_eq!(meta.studios, Some(vec!["Sunrise".to_string()]));
    }

    #[test]
    fn candidates_without_mal_id_are_skipped() {
        let media = AniListMedia::default();
        assert!(media.into_candidate().is_none());
    }

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after(" 42 "), 42);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), 0);
    }

    #[test]
    fn strip_markup_keeps_bare_angle_brackets() {
        assert_eq!(strip_markup("If a < b and c > d"), "If a < b and c > d");
        assert_eq!(
            strip_markup("<i>Bounty</i> hunters.<BR />In <b>2071</b>."),
            "Bounty hunters.\nIn 2071."
        );
    }
}
