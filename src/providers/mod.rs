//! External metadata provider clients.
//!
//! Each client is a thin blocking HTTP wrapper that maps a provider's search
//! response onto candidate structs. Clients never touch the catalog store;
//! the aggregator merges their candidates into a single entity.

mod discogs;
mod itunes;
mod lastfm;
mod musicbrainz;
mod spotify;
mod wikipedia;

pub use discogs::DiscogsClient;
pub use itunes::ITunesClient;
pub use lastfm::LastFmClient;
pub use musicbrainz::MusicBrainzClient;
pub use spotify::SpotifyClient;
pub use wikipedia::WikipediaClient;

use anyhow::Result;

/// Partial artist metadata from one provider. Unset fields stay `None` and
/// never overwrite values from earlier providers during the merge.
#[derive(Debug, Clone, Default)]
pub struct ArtistCandidate {
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub alternate_names: Vec<String>,
    pub real_name: Option<String>,
    /// Raw provider type string, classified by the aggregator.
    pub artist_type: Option<String>,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub profile: Option<String>,
    pub thumbnail_url: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub itunes_id: Option<String>,
    pub amg_id: Option<String>,
    pub spotify_id: Option<String>,
    pub discogs_id: Option<String>,
    pub isni: Vec<String>,
    pub tags: Vec<String>,
    pub urls: Vec<String>,
    pub genres: Vec<String>,
    pub image_urls: Vec<String>,
}

/// A label credit attached to a provider's release answer.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLabelCandidate {
    pub name: String,
    pub catalog_number: Option<String>,
}

/// Partial release metadata from one provider.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCandidate {
    pub title: Option<String>,
    pub alternate_names: Vec<String>,
    pub release_date: Option<String>,
    pub track_count: Option<i32>,
    /// Raw provider type string, classified by the aggregator.
    pub release_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub itunes_id: Option<String>,
    pub amg_id: Option<String>,
    pub spotify_id: Option<String>,
    pub discogs_id: Option<String>,
    pub tags: Vec<String>,
    pub urls: Vec<String>,
    pub genres: Vec<String>,
    pub image_urls: Vec<String>,
    pub labels: Vec<ReleaseLabelCandidate>,
}

/// Partial label metadata from one provider.
#[derive(Debug, Clone, Default)]
pub struct LabelCandidate {
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub alternate_names: Vec<String>,
    pub musicbrainz_id: Option<String>,
    pub discogs_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub image_urls: Vec<String>,
}

/// A metadata search provider.
///
/// Implementations return their single best match, or `Ok(None)` when the
/// provider has no result (including when it does not support the entity
/// kind at all). Errors are isolated per provider by the aggregator.
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn search_artist(&self, _query: &str) -> Result<Option<ArtistCandidate>> {
        Ok(None)
    }

    fn search_release(&self, _artist_name: &str, _title: &str) -> Result<Option<ReleaseCandidate>> {
        Ok(None)
    }

    fn search_label(&self, _query: &str) -> Result<Option<LabelCandidate>> {
        Ok(None)
    }
}
