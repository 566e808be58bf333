//! MusicBrainz web service client.
//!
//! Rate limited to 1 request per second per MusicBrainz etiquette; a
//! descriptive User-Agent is mandatory or the service returns 403.

use super::{ArtistCandidate, ReleaseCandidate, SearchProvider};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = concat!("roadie/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

pub struct MusicBrainzClient {
    client: Client,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct ArtistSearchResponse {
    artists: Option<Vec<MbArtist>>,
}

#[derive(Deserialize)]
struct MbArtist {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "sort-name")]
    sort_name: Option<String>,
    #[serde(rename = "type")]
    artist_type: Option<String>,
    #[serde(rename = "life-span")]
    life_span: Option<MbLifeSpan>,
    aliases: Option<Vec<MbAlias>>,
    isnis: Option<Vec<String>>,
    tags: Option<Vec<MbTag>>,
}

#[derive(Deserialize)]
struct MbLifeSpan {
    begin: Option<String>,
    end: Option<String>,
}

#[derive(Deserialize)]
struct MbAlias {
    name: Option<String>,
}

#[derive(Deserialize)]
struct MbTag {
    name: Option<String>,
}

#[derive(Deserialize)]
struct ReleaseGroupSearchResponse {
    #[serde(rename = "release-groups")]
    release_groups: Option<Vec<MbReleaseGroup>>,
}

#[derive(Deserialize)]
struct MbReleaseGroup {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "primary-type")]
    primary_type: Option<String>,
    #[serde(rename = "first-release-date")]
    first_release_date: Option<String>,
    tags: Option<Vec<MbTag>>,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            last_request: Mutex::new(Instant::now() - RATE_LIMIT_INTERVAL),
        })
    }

    fn rate_limit(&self) {
        let mut last = self.last_request.lock().unwrap();
        let elapsed = last.elapsed();
        if elapsed < RATE_LIMIT_INTERVAL {
            std::thread::sleep(RATE_LIMIT_INTERVAL - elapsed);
        }
        *last = Instant::now();
    }

    fn get(&self, path: &str, query: &str) -> Result<reqwest::blocking::Response> {
        self.rate_limit();

        let url = format!(
            "{}/{}?query={}&fmt=json&limit=1",
            MUSICBRAINZ_API_BASE,
            path,
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            anyhow::bail!("MusicBrainz API failed with status {}", response.status());
        }
        Ok(response)
    }
}

fn first<T>(items: Option<Vec<T>>) -> Option<T> {
    items.and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) })
}

impl SearchProvider for MusicBrainzClient {
    fn name(&self) -> &'static str {
        "MusicBrainz"
    }

    fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
        let body: ArtistSearchResponse = self.get("artist", query)?.json()?;
        let Some(artist) = first(body.artists) else {
            return Ok(None);
        };

        let candidate = ArtistCandidate {
            name: artist.name,
            sort_name: artist.sort_name,
            artist_type: artist.artist_type,
            begin_date: artist.life_span.as_ref().and_then(|l| l.begin.clone()),
            end_date: artist.life_span.as_ref().and_then(|l| l.end.clone()),
            musicbrainz_id: artist.id,
            alternate_names: artist
                .aliases
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.name)
                .collect(),
            isni: artist.isnis.unwrap_or_default(),
            tags: artist
                .tags
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| t.name)
                .collect(),
            ..Default::default()
        };
        Ok(Some(candidate))
    }

    fn search_release(&self, artist_name: &str, title: &str) -> Result<Option<ReleaseCandidate>> {
        let query = format!("releasegroup:\"{}\" AND artist:\"{}\"", title, artist_name);
        let body: ReleaseGroupSearchResponse = self.get("release-group", &query)?.json()?;
        let Some(group) = first(body.release_groups) else {
            return Ok(None);
        };

        let candidate = ReleaseCandidate {
            title: group.title,
            release_type: group.primary_type,
            release_date: group.first_release_date.filter(|d| !d.is_empty()),
            musicbrainz_id: group.id,
            tags: group
                .tags
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| t.name)
                .collect(),
            ..Default::default()
        };
        Ok(Some(candidate))
    }
}
