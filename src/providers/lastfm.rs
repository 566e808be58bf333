//! Last.fm API client.
//!
//! Rate limited to 5 requests per second per Last.fm API guidelines.

use super::{ArtistCandidate, ReleaseCandidate, SearchProvider};
use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(200); // 5 req/sec

pub struct LastFmClient {
    client: Client,
    api_key: String,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct ArtistInfoResponse {
    artist: Option<LastFmArtist>,
}

#[derive(Deserialize)]
struct LastFmArtist {
    name: Option<String>,
    mbid: Option<String>,
    url: Option<String>,
    image: Option<Vec<LastFmImage>>,
    bio: Option<LastFmBio>,
    tags: Option<LastFmTags>,
}

#[derive(Deserialize)]
struct LastFmImage {
    #[serde(rename = "#text")]
    url: Option<String>,
    size: Option<String>,
}

#[derive(Deserialize)]
struct LastFmBio {
    summary: Option<String>,
}

#[derive(Deserialize)]
struct LastFmTags {
    tag: Option<Vec<LastFmTag>>,
}

#[derive(Deserialize)]
struct LastFmTag {
    name: Option<String>,
}

#[derive(Deserialize)]
struct AlbumInfoResponse {
    album: Option<LastFmAlbum>,
}

#[derive(Deserialize)]
struct LastFmAlbum {
    name: Option<String>,
    mbid: Option<String>,
    url: Option<String>,
    image: Option<Vec<LastFmImage>>,
    tags: Option<LastFmTags>,
}

fn largest_image(images: Option<Vec<LastFmImage>>) -> Option<String> {
    let images = images?;
    let preference = ["mega", "extralarge", "large", "medium", "small"];
    for size in preference {
        if let Some(url) = images
            .iter()
            .find(|i| i.size.as_deref() == Some(size))
            .and_then(|i| i.url.clone())
            .filter(|u| !u.is_empty())
        {
            return Some(url);
        }
    }
    None
}

fn tag_names(tags: Option<LastFmTags>) -> Vec<String> {
    tags.and_then(|t| t.tag)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.name)
        .collect()
}

impl LastFmClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
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

    fn get(&self, params: &str) -> Result<Option<reqwest::blocking::Response>> {
        self.rate_limit();

        let url = format!(
            "{}?{}&api_key={}&format=json",
            LASTFM_API_BASE, params, self.api_key
        );

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            if response.status().as_u16() == 429 {
                // Rate limited
                return Ok(None);
            }
            anyhow::bail!("Last.fm API failed with status {}", response.status());
        }
        Ok(Some(response))
    }
}

impl SearchProvider for LastFmClient {
    fn name(&self) -> &'static str {
        "LastFM"
    }

    fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
        let params = format!(
            "method=artist.getinfo&artist={}&autocorrect=1",
            urlencoding::encode(query)
        );
        let Some(response) = self.get(&params)? else {
            return Ok(None);
        };
        let body: ArtistInfoResponse = response.json()?;
        let Some(artist) = body.artist else {
            return Ok(None);
        };

        let mut candidate = ArtistCandidate {
            name: artist.name,
            musicbrainz_id: artist.mbid.filter(|m| !m.is_empty()),
            profile: artist.bio.and_then(|b| b.summary).filter(|s| !s.is_empty()),
            tags: tag_names(artist.tags),
            ..Default::default()
        };
        if let Some(url) = artist.url {
            candidate.urls.push(url);
        }
        if let Some(image) = largest_image(artist.image) {
            candidate.thumbnail_url = Some(image.clone());
            candidate.image_urls.push(image);
        }
        Ok(Some(candidate))
    }

    fn search_release(&self, artist_name: &str, title: &str) -> Result<Option<ReleaseCandidate>> {
        let params = format!(
            "method=album.getinfo&artist={}&album={}&autocorrect=1",
            urlencoding::encode(artist_name),
            urlencoding::encode(title)
        );
        let Some(response) = self.get(&params)? else {
            return Ok(None);
        };
        let body: AlbumInfoResponse = response.json()?;
        let Some(album) = body.album else {
            return Ok(None);
        };

        let mut candidate = ReleaseCandidate {
            title: album.name,
            musicbrainz_id: album.mbid.filter(|m| !m.is_empty()),
            tags: tag_names(album.tags),
            ..Default::default()
        };
        if let Some(url) = album.url {
            candidate.urls.push(url);
        }
        if let Some(image) = largest_image(album.image) {
            candidate.thumbnail_url = Some(image.clone());
            candidate.image_urls.push(image);
        }
        Ok(Some(candidate))
    }
}
