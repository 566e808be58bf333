//! iTunes Search API client. No API key required.

use super::{ArtistCandidate, ReleaseCandidate, SearchProvider};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const ITUNES_API_BASE: &str = "https://itunes.apple.com/search";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(500); // ~20 req/min limit

pub struct ITunesClient {
    client: Client,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Option<Vec<ITunesResult>>,
}

#[derive(Deserialize)]
struct ITunesResult {
    #[serde(rename = "artistId")]
    artist_id: Option<i64>,
    #[serde(rename = "artistName")]
    artist_name: Option<String>,
    #[serde(rename = "artistLinkUrl")]
    artist_link_url: Option<String>,
    #[serde(rename = "amgArtistId")]
    amg_artist_id: Option<i64>,
    #[serde(rename = "amgAlbumId")]
    amg_album_id: Option<i64>,
    #[serde(rename = "collectionId")]
    collection_id: Option<i64>,
    #[serde(rename = "collectionName")]
    collection_name: Option<String>,
    #[serde(rename = "artworkUrl100")]
    artwork_url: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
    #[serde(rename = "trackCount")]
    track_count: Option<i32>,
    #[serde(rename = "primaryGenreName")]
    primary_genre_name: Option<String>,
}

impl ITunesClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
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

    fn search(&self, term: &str, entity: &str) -> Result<Option<ITunesResult>> {
        self.rate_limit();

        let url = format!(
            "{}?term={}&entity={}&limit=1",
            ITUNES_API_BASE,
            urlencoding::encode(term),
            entity
        );

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            anyhow::bail!("iTunes API failed with status {}", response.status());
        }

        let body: SearchResponse = response.json()?;
        Ok(body.results.and_then(|mut r| {
            if r.is_empty() {
                None
            } else {
                Some(r.remove(0))
            }
        }))
    }
}

impl SearchProvider for ITunesClient {
    fn name(&self) -> &'static str {
        "iTunes"
    }

    fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
        let Some(result) = self.search(query, "musicArtist")? else {
            return Ok(None);
        };

        let mut candidate = ArtistCandidate {
            name: result.artist_name,
            itunes_id: result.artist_id.map(|id| id.to_string()),
            amg_id: result.amg_artist_id.map(|id| id.to_string()),
            ..Default::default()
        };
        if let Some(url) = result.artist_link_url {
            candidate.urls.push(url);
        }
        if let Some(genre) = result.primary_genre_name {
            candidate.genres.push(genre);
        }
        Ok(Some(candidate))
    }

    fn search_release(&self, artist_name: &str, title: &str) -> Result<Option<ReleaseCandidate>> {
        let term = format!("{} {}", artist_name, title);
        let Some(result) = self.search(&term, "album")? else {
            return Ok(None);
        };

        let mut candidate = ReleaseCandidate {
            title: result.collection_name,
            itunes_id: result.collection_id.map(|id| id.to_string()),
            amg_id: result.amg_album_id.map(|id| id.to_string()),
            release_date: result.release_date.map(|d| d.chars().take(10).collect()),
            track_count: result.track_count,
            thumbnail_url: result.artwork_url.clone(),
            ..Default::default()
        };
        if let Some(url) = result.artwork_url {
            candidate.image_urls.push(url);
        }
        if let Some(genre) = result.primary_genre_name {
            candidate.genres.push(genre);
        }
        Ok(Some(candidate))
    }
}
