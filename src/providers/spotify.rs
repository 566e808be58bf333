//! Spotify Web API client using the client-credentials flow.
//!
//! The access token is fetched lazily on first use and refreshed once it
//! expires. Searches use the public /search endpoint.

use super::{ArtistCandidate, ReleaseCandidate, SearchProvider};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(250);

pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
    last_request: Mutex<Instant>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    artists: Option<Page<SpotifyArtist>>,
    albums: Option<Page<SpotifyAlbum>>,
}

#[derive(Deserialize)]
struct Page<T> {
    items: Option<Vec<T>>,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    id: Option<String>,
    name: Option<String>,
    genres: Option<Vec<String>>,
    images: Option<Vec<SpotifyImage>>,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    id: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    total_tracks: Option<i32>,
    album_type: Option<String>,
    images: Option<Vec<SpotifyImage>>,
}

#[derive(Deserialize)]
struct SpotifyImage {
    url: Option<String>,
}

impl SpotifyClient {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
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

    fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().unwrap();
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let response = self
            .client
            .post(SPOTIFY_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;
        if !response.status().is_success() {
            anyhow::bail!("Spotify token request failed with status {}", response.status());
        }
        let token: TokenResponse = response.json().context("Malformed Spotify token response")?;

        // Renew a minute early so in-flight requests never race expiry.
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
        let access_token = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    fn search(&self, query: &str, kind: &str) -> Result<SearchResponse> {
        self.rate_limit();
        let token = self.access_token()?;

        let url = format!(
            "{}/search?q={}&type={}&limit=1",
            SPOTIFY_API_BASE,
            urlencoding::encode(query),
            kind
        );

        let response = self.client.get(&url).bearer_auth(token).send()?;
        if !response.status().is_success() {
            anyhow::bail!("Spotify API failed with status {}", response.status());
        }
        Ok(response.json()?)
    }
}

fn first<T>(page: Option<Page<T>>) -> Option<T> {
    page.and_then(|p| p.items)
        .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) })
}

impl SearchProvider for SpotifyClient {
    fn name(&self) -> &'static str {
        "Spotify"
    }

    fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
        let body = self.search(query, "artist")?;
        let Some(artist) = first(body.artists) else {
            return Ok(None);
        };

        let mut candidate = ArtistCandidate {
            name: artist.name,
            spotify_id: artist.id,
            genres: artist.genres.unwrap_or_default(),
            ..Default::default()
        };
        for image in artist.images.unwrap_or_default() {
            if let Some(url) = image.url {
                if candidate.thumbnail_url.is_none() {
                    candidate.thumbnail_url = Some(url.clone());
                }
                candidate.image_urls.push(url);
            }
        }
        Ok(Some(candidate))
    }

    fn search_release(&self, artist_name: &str, title: &str) -> Result<Option<ReleaseCandidate>> {
        let query = format!("album:{} artist:{}", title, artist_name);
        let body = self.search(&query, "album")?;
        let Some(album) = first(body.albums) else {
            return Ok(None);
        };

        let mut candidate = ReleaseCandidate {
            title: album.name,
            spotify_id: album.id,
            release_date: album.release_date,
            track_count: album.total_tracks,
            release_type: album.album_type,
            ..Default::default()
        };
        for image in album.images.unwrap_or_default() {
            if let Some(url) = image.url {
                if candidate.thumbnail_url.is_none() {
                    candidate.thumbnail_url = Some(url.clone());
                }
                candidate.image_urls.push(url);
            }
        }
        Ok(Some(candidate))
    }
}
