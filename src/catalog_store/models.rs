//! Catalog models for SQLite-backed storage.
//!
//! List-ish fields (alternate names, tags, urls) are plain `Vec<String>`
//! here; pipe-joining happens only at the storage boundary in `store`.

use crate::normalize;
use serde::{Deserialize, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// Artist classification.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ArtistType {
    Person,
    Group,
    Orchestra,
    Choir,
    Character,
    Other,
}

impl ArtistType {
    /// Convert from database string representation
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "PERSON" => ArtistType::Person,
            "GROUP" => ArtistType::Group,
            "ORCHESTRA" => ArtistType::Orchestra,
            "CHOIR" => ArtistType::Choir,
            "CHARACTER" => ArtistType::Character,
            _ => ArtistType::Other,
        }
    }

    /// Convert to database string representation
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ArtistType::Person => "PERSON",
            ArtistType::Group => "GROUP",
            ArtistType::Orchestra => "ORCHESTRA",
            ArtistType::Choir => "CHOIR",
            ArtistType::Character => "CHARACTER",
            ArtistType::Other => "OTHER",
        }
    }
}

/// Release classification.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReleaseType {
    Album,
    Ep,
    Single,
    Compilation,
    Unknown,
}

impl ReleaseType {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "ALBUM" => ReleaseType::Album,
            "EP" => ReleaseType::Ep,
            "SINGLE" => ReleaseType::Single,
            "COMPILATION" => ReleaseType::Compilation,
            _ => ReleaseType::Unknown,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReleaseType::Album => "ALBUM",
            ReleaseType::Ep => "EP",
            ReleaseType::Single => "SINGLE",
            ReleaseType::Compilation => "COMPILATION",
            ReleaseType::Unknown => "UNKNOWN",
        }
    }
}

/// Release lifecycle status, driven by reconciliation and merge.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReleaseStatus {
    New,
    Incomplete,
    Complete,
    Missing,
    Deleted,
}

impl ReleaseStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "INCOMPLETE" => ReleaseStatus::Incomplete,
            "COMPLETE" => ReleaseStatus::Complete,
            "MISSING" => ReleaseStatus::Missing,
            "DELETED" => ReleaseStatus::Deleted,
            _ => ReleaseStatus::New,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReleaseStatus::New => "NEW",
            ReleaseStatus::Incomplete => "INCOMPLETE",
            ReleaseStatus::Complete => "COMPLETE",
            ReleaseStatus::Missing => "MISSING",
            ReleaseStatus::Deleted => "DELETED",
        }
    }
}

/// Whether the library holds every track the release claims to have.
///
/// Derived from tag-self-reported totals; a soft invariant, not verified
/// against any authoritative source.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LibraryStatus {
    Incomplete,
    Complete,
}

impl LibraryStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "COMPLETE" => LibraryStatus::Complete,
            _ => LibraryStatus::Incomplete,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            LibraryStatus::Incomplete => "INCOMPLETE",
            LibraryStatus::Complete => "COMPLETE",
        }
    }
}

/// Per-track scan state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrackStatus {
    New,
    Ok,
    Missing,
}

impl TrackStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "OK" => TrackStatus::Ok,
            "MISSING" => TrackStatus::Missing,
            _ => TrackStatus::New,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TrackStatus::New => "NEW",
            TrackStatus::Ok => "OK",
            TrackStatus::Missing => "MISSING",
        }
    }
}

/// Per-medium aggregate state: `Incomplete` when the discovered track
/// numbers do not form a contiguous run starting at 1.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaStatus {
    Ok,
    Incomplete,
}

impl MediaStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "INCOMPLETE" => MediaStatus::Incomplete,
            _ => MediaStatus::Ok,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MediaStatus::Ok => "OK",
            MediaStatus::Incomplete => "INCOMPLETE",
        }
    }
}

/// Image persistence state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageStatus {
    New,
    Persisted,
}

impl ImageStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "PERSISTED" => ImageStatus::Persisted,
            _ => ImageStatus::New,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImageStatus::New => "NEW",
            ImageStatus::Persisted => "PERSISTED",
        }
    }
}

// =============================================================================
// Core Entities
// =============================================================================

/// Canonical artist record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    #[serde(skip)]
    pub id: i64,
    /// Stable external UUID, assigned once on creation.
    pub roadie_id: String,
    pub name: String,
    pub sort_name: String,
    pub alternate_names: Vec<String>,
    pub real_name: Option<String>,
    pub artist_type: Option<ArtistType>,
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
}

impl Artist {
    /// Ensure the alternate-names set contains the alphanumeric-folded form
    /// of the canonical name.
    pub fn close_alternate_names(&mut self) {
        let folded = normalize::normalize(&self.name).alphanumeric;
        if !folded.is_empty() && !self.alternate_names.iter().any(|a| a == &folded) {
            self.alternate_names.push(folded);
        }
        self.alternate_names.sort();
        self.alternate_names.dedup();
    }
}

/// Canonical release record, owned by exactly one artist.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Release {
    #[serde(skip)]
    pub id: i64,
    pub roadie_id: String,
    #[serde(skip)]
    pub artist_id: i64,
    pub title: String,
    pub alternate_names: Vec<String>,
    pub release_date: Option<String>,
    /// Derived by reconciliation; never authoritative.
    pub track_count: i32,
    /// Derived by reconciliation; never authoritative.
    pub media_count: i32,
    pub release_type: Option<ReleaseType>,
    pub thumbnail_url: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub itunes_id: Option<String>,
    pub amg_id: Option<String>,
    pub spotify_id: Option<String>,
    pub discogs_id: Option<String>,
    pub tags: Vec<String>,
    pub urls: Vec<String>,
    #[serde(skip)]
    pub status: ReleaseStatus,
    #[serde(skip)]
    pub library_status: LibraryStatus,
}

impl Release {
    pub fn close_alternate_names(&mut self) {
        let folded = normalize::normalize(&self.title).alphanumeric;
        if !folded.is_empty() && !self.alternate_names.iter().any(|a| a == &folded) {
            self.alternate_names.push(folded);
        }
        self.alternate_names.sort();
        self.alternate_names.dedup();
    }
}

impl Default for ReleaseStatus {
    fn default() -> Self {
        ReleaseStatus::New
    }
}

impl Default for LibraryStatus {
    fn default() -> Self {
        LibraryStatus::Incomplete
    }
}

impl Default for TrackStatus {
    fn default() -> Self {
        TrackStatus::New
    }
}

impl Default for MediaStatus {
    fn default() -> Self {
        MediaStatus::Ok
    }
}

impl Default for ImageStatus {
    fn default() -> Self {
        ImageStatus::New
    }
}

/// One physical/logical disk within a release.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseMedia {
    pub id: i64,
    pub release_id: i64,
    pub media_number: i32,
    pub track_count: i32,
    pub status: MediaStatus,
}

/// One audio file within a release medium.
///
/// `(release_media_id, track_number)` is unique. The recorded file path is
/// the last known location; the canonical path is recomputed each scan.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    #[serde(skip)]
    pub id: i64,
    pub roadie_id: String,
    #[serde(skip)]
    pub release_media_id: i64,
    pub title: String,
    pub track_number: i32,
    pub duration_ms: Option<i64>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    /// Content fingerprint; a change forces a metadata/status refresh.
    pub hash: Option<String>,
    #[serde(skip)]
    pub status: TrackStatus,
    /// Track-level artist when the performer differs from the release artist.
    #[serde(skip)]
    pub artist_id: Option<i64>,
    pub part_titles: Vec<String>,
    pub musicbrainz_id: Option<String>,
    pub isrc: Option<String>,
    pub amg_id: Option<String>,
    pub spotify_id: Option<String>,
}

/// Canonical label record; many-to-many with releases via `ReleaseLabel`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    #[serde(skip)]
    pub id: i64,
    pub roadie_id: String,
    pub name: String,
    pub sort_name: String,
    pub alternate_names: Vec<String>,
    pub musicbrainz_id: Option<String>,
    pub discogs_id: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl Label {
    pub fn close_alternate_names(&mut self) {
        let folded = normalize::normalize(&self.name).alphanumeric;
        if !folded.is_empty() && !self.alternate_names.iter().any(|a| a == &folded) {
            self.alternate_names.push(folded);
        }
        self.alternate_names.sort();
        self.alternate_names.dedup();
    }
}

/// Release-to-label association with catalog number and validity range.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseLabel {
    pub release_id: i64,
    pub label_id: i64,
    pub catalog_number: Option<String>,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
}

/// Shared genre, keyed by normalized name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
}

/// A fetched image and its provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub url: String,
    /// Perceptual hash used for dedup.
    pub signature: String,
    pub bytes: Vec<u8>,
    pub artist_id: Option<i64>,
    pub release_id: Option<i64>,
    pub label_id: Option<i64>,
    pub track_id: Option<i64>,
    pub status: ImageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_type_roundtrip() {
        let types = vec![
            ArtistType::Person,
            ArtistType::Group,
            ArtistType::Orchestra,
            ArtistType::Choir,
            ArtistType::Character,
            ArtistType::Other,
        ];
        for artist_type in types {
            let parsed = ArtistType::from_db_str(artist_type.to_db_str());
            assert_eq!(artist_type, parsed);
        }
    }

    #[test]
    fn test_release_status_roundtrip() {
        let statuses = vec![
            ReleaseStatus::New,
            ReleaseStatus::Incomplete,
            ReleaseStatus::Complete,
            ReleaseStatus::Missing,
            ReleaseStatus::Deleted,
        ];
        for status in statuses {
            assert_eq!(status, ReleaseStatus::from_db_str(status.to_db_str()));
        }
    }

    #[test]
    fn test_track_status_unknown_falls_back_to_new() {
        assert_eq!(TrackStatus::from_db_str("whatever"), TrackStatus::New);
    }

    #[test]
    fn test_close_alternate_names_adds_folded_form() {
        let mut artist = Artist {
            name: "AC/DC".to_string(),
            ..Default::default()
        };
        artist.close_alternate_names();
        assert!(artist.alternate_names.contains(&"acdc".to_string()));
    }

    #[test]
    fn test_close_alternate_names_is_idempotent() {
        let mut artist = Artist {
            name: "Queen".to_string(),
            ..Default::default()
        };
        artist.close_alternate_names();
        artist.close_alternate_names();
        assert_eq!(
            artist
                .alternate_names
                .iter()
                .filter(|a| a.as_str() == "queen")
                .count(),
            1
        );
    }

    #[test]
    fn test_artist_sidecar_json_shape() {
        let json = r#"{
            "roadie_id": "0c2e8e0a-47cc-46a2-9b16-2e9b734558a9",
            "name": "Nina Simone",
            "sort_name": "Simone, Nina",
            "artist_type": "Person",
            "tags": ["jazz", "soul"]
        }"#;
        let artist: Artist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.name, "Nina Simone");
        assert_eq!(artist.artist_type, Some(ArtistType::Person));
        assert_eq!(artist.tags.len(), 2);
    }
}
