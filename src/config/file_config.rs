use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub library_root: Option<String>,
    pub max_images: Option<usize>,

    // Provider configuration
    pub providers: Option<ProvidersConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub itunes_enabled: Option<bool>,
    pub musicbrainz_enabled: Option<bool>,
    pub wikipedia_enabled: Option<bool>,
    pub lastfm_api_key: Option<String>,
    pub discogs_token: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
