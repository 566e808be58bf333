//! Discogs database search client. Requires a personal access token.

use super::{
    ArtistCandidate, LabelCandidate, ReleaseCandidate, ReleaseLabelCandidate, SearchProvider,
};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DISCOGS_API_BASE: &str = "https://api.discogs.com/database/search";
const USER_AGENT: &str = concat!("roadie/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(1100); // 60 req/min authenticated

pub struct DiscogsClient {
    client: Client,
    token: String,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Option<Vec<DiscogsResult>>,
}

#[derive(Deserialize)]
struct DiscogsResult {
    id: Option<i64>,
    title: Option<String>,
    year: Option<String>,
    thumb: Option<String>,
    cover_image: Option<String>,
    genre: Option<Vec<String>>,
    style: Option<Vec<String>>,
    label: Option<Vec<String>>,
    catno: Option<String>,
}

impl DiscogsClient {
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            token: token.to_string(),
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

    fn search(&self, query: &str, kind: &str) -> Result<Option<DiscogsResult>> {
        self.rate_limit();

        let url = format!(
            "{}?q={}&type={}&per_page=1&token={}",
            DISCOGS_API_BASE,
            urlencoding::encode(query),
            kind,
            self.token
        );

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            if response.status().as_u16() == 429 {
                // Rate limited
                return Ok(None);
            }
            anyhow::bail!("Discogs API failed with status {}", response.status());
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

impl SearchProvider for DiscogsClient {
    fn name(&self) -> &'static str {
        "Discogs"
    }

    fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
        let Some(result) = self.search(query, "artist")? else {
            return Ok(None);
        };

        let mut candidate = ArtistCandidate {
            name: result.title,
            discogs_id: result.id.map(|id| id.to_string()),
            thumbnail_url: result.thumb.filter(|t| !t.is_empty()),
            ..Default::default()
        };
        if let Some(cover) = result.cover_image.filter(|c| !c.is_empty()) {
            candidate.image_urls.push(cover);
        }
        Ok(Some(candidate))
    }

    fn search_release(&self, artist_name: &str, title: &str) -> Result<Option<ReleaseCandidate>> {
        let query = format!("{} {}", artist_name, title);
        let Some(result) = self.search(&query, "master")? else {
            return Ok(None);
        };

        let mut genres = result.genre.unwrap_or_default();
        genres.extend(result.style.unwrap_or_default());

        // Discogs reports one catalog number per result; it belongs to the
        // first credited label.
        let catno = result.catno.filter(|c| !c.is_empty());
        let labels = result
            .label
            .unwrap_or_default()
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .enumerate()
            .map(|(i, name)| ReleaseLabelCandidate {
                name,
                catalog_number: if i == 0 { catno.clone() } else { None },
            })
            .collect();

        let mut candidate = ReleaseCandidate {
            // Discogs titles come as "Artist - Title".
            title: result
                .title
                .map(|t| match t.split_once(" - ") {
                    Some((_, release_title)) => release_title.to_string(),
                    None => t,
                }),
            discogs_id: result.id.map(|id| id.to_string()),
            release_date: result.year.filter(|y| !y.is_empty()),
            thumbnail_url: result.thumb.filter(|t| !t.is_empty()),
            genres,
            labels,
            ..Default::default()
        };
        if let Some(cover) = result.cover_image.filter(|c| !c.is_empty()) {
            candidate.image_urls.push(cover);
        }
        Ok(Some(candidate))
    }

    fn search_label(&self, query: &str) -> Result<Option<LabelCandidate>> {
        let Some(result) = self.search(query, "label")? else {
            return Ok(None);
        };

        let mut candidate = LabelCandidate {
            name: result.title,
            discogs_id: result.id.map(|id| id.to_string()),
            thumbnail_url: result.thumb.filter(|t| !t.is_empty()),
            ..Default::default()
        };
        if let Some(cover) = result.cover_image.filter(|c| !c.is_empty()) {
            candidate.image_urls.push(cover);
        }
        Ok(Some(candidate))
    }
}
