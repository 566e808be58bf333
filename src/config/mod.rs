mod file_config;

pub use file_config::{FileConfig, ProvidersConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub library_root: Option<PathBuf>,
    pub max_images: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    /// Root of the music library. Optional; commands that scan folders
    /// require it and fail fast when absent.
    pub library_root: Option<PathBuf>,
    pub max_images: usize,
    pub providers: ProviderSettings,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub itunes_enabled: bool,
    pub musicbrainz_enabled: bool,
    pub wikipedia_enabled: bool,
    pub lastfm_api_key: Option<String>,
    pub discogs_token: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            itunes_enabled: true,
            musicbrainz_enabled: true,
            wikipedia_enabled: true,
            lastfm_api_key: None,
            discogs_token: None,
            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let library_root = file
            .library_root
            .map(PathBuf::from)
            .or_else(|| cli.library_root.clone());
        if let Some(root) = &library_root {
            if !root.is_dir() {
                bail!("Library root is not a directory: {:?}", root);
            }
        }

        let max_images = file.max_images.unwrap_or(cli.max_images);

        let providers_file = file.providers.unwrap_or_default();
        let defaults = ProviderSettings::default();
        let providers = ProviderSettings {
            itunes_enabled: providers_file
                .itunes_enabled
                .unwrap_or(defaults.itunes_enabled),
            musicbrainz_enabled: providers_file
                .musicbrainz_enabled
                .unwrap_or(defaults.musicbrainz_enabled),
            wikipedia_enabled: providers_file
                .wikipedia_enabled
                .unwrap_or(defaults.wikipedia_enabled),
            lastfm_api_key: providers_file.lastfm_api_key,
            discogs_token: providers_file.discogs_token,
            spotify_client_id: providers_file.spotify_client_id,
            spotify_client_secret: providers_file.spotify_client_secret,
        };

        Ok(Self {
            db_dir,
            library_root,
            max_images,
            providers,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("roadie.db")
    }
}
