//! Wikipedia REST summary client. Used only to enrich artist profiles.

use super::{ArtistCandidate, SearchProvider};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WIKIPEDIA_API_BASE: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const USER_AGENT: &str = concat!("roadie/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(200);

pub struct WikipediaClient {
    client: Client,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    extract: Option<String>,
    thumbnail: Option<Thumbnail>,
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct Thumbnail {
    source: Option<String>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: Option<DesktopUrls>,
}

#[derive(Deserialize)]
struct DesktopUrls {
    page: Option<String>,
}

impl WikipediaClient {
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
}

impl SearchProvider for WikipediaClient {
    fn name(&self) -> &'static str {
        "Wikipedia"
    }

    fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
        self.rate_limit();

        let title = query.replace(' ', "_");
        let url = format!("{}/{}", WIKIPEDIA_API_BASE, urlencoding::encode(&title));

        let response = self.client.get(&url).send()?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Wikipedia API failed with status {}", response.status());
        }

        let body: SummaryResponse = response.json()?;

        let mut candidate = ArtistCandidate {
            profile: body.extract.filter(|e| !e.is_empty()),
            thumbnail_url: body.thumbnail.and_then(|t| t.source),
            ..Default::default()
        };
        if let Some(page) = body
            .content_urls
            .and_then(|c| c.desktop)
            .and_then(|d| d.page)
        {
            candidate.urls.push(page);
        }
        if candidate.profile.is_none() && candidate.thumbnail_url.is_none() {
            return Ok(None);
        }
        Ok(Some(candidate))
    }
}
