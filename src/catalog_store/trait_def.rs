//! CatalogStore trait definition.
//!
//! The relational store is the single source of truth. This trait is the
//! seam between the engines (resolver, reconciler, merger) and the SQLite
//! implementation; tests exercise it through temporary databases.

use super::models::*;
use crate::normalize::SearchKey;
use anyhow::Result;

/// Storage backend for the canonical catalog.
///
/// Name lookups match both normalized forms against `name`, `sort_name` and
/// the delimited alternate-names list. When several rows match, the lowest
/// id wins (deterministic tie-break).
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Artists
    // =========================================================================

    /// Insert an artist together with its genre associations and images in
    /// one transaction. Returns the generated id.
    fn create_artist(&self, artist: &Artist, genres: &[String], images: &[Image]) -> Result<i64>;

    fn get_artist(&self, id: i64) -> Result<Option<Artist>>;

    fn find_artist_by_name(&self, key: &SearchKey) -> Result<Option<Artist>>;

    fn update_artist(&self, artist: &Artist) -> Result<()>;

    fn delete_artist(&self, id: i64) -> Result<()>;

    // =========================================================================
    // Releases
    // =========================================================================

    /// Insert a release together with genre associations and images in one
    /// transaction. Returns the generated id.
    fn create_release(&self, release: &Release, genres: &[String], images: &[Image])
        -> Result<i64>;

    fn get_release(&self, id: i64) -> Result<Option<Release>>;

    /// Find a release by normalized title, scoped to its parent artist.
    fn find_release_by_title(&self, artist_id: i64, key: &SearchKey) -> Result<Option<Release>>;

    fn update_release(&self, release: &Release) -> Result<()>;

    fn delete_release(&self, id: i64) -> Result<()>;

    fn list_releases_for_artist(&self, artist_id: i64) -> Result<Vec<Release>>;

    /// Move a release under another artist.
    fn reassign_release_artist(&self, release_id: i64, artist_id: i64) -> Result<()>;

    // =========================================================================
    // Release media
    // =========================================================================

    fn insert_release_media(&self, media: &ReleaseMedia) -> Result<i64>;

    fn find_release_media(
        &self,
        release_id: i64,
        media_number: i32,
    ) -> Result<Option<ReleaseMedia>>;

    fn list_release_media(&self, release_id: i64) -> Result<Vec<ReleaseMedia>>;

    fn update_release_media(&self, media: &ReleaseMedia) -> Result<()>;

    fn delete_release_media(&self, id: i64) -> Result<()>;

    // =========================================================================
    // Tracks
    // =========================================================================

    fn insert_track(&self, track: &Track) -> Result<i64>;

    fn get_track(&self, id: i64) -> Result<Option<Track>>;

    fn find_track(&self, release_media_id: i64, track_number: i32) -> Result<Option<Track>>;

    fn update_track(&self, track: &Track) -> Result<()>;

    fn delete_track(&self, id: i64) -> Result<()>;

    fn list_tracks_for_release(&self, release_id: i64) -> Result<Vec<Track>>;

    fn list_tracks_for_media(&self, release_media_id: i64) -> Result<Vec<Track>>;

    /// Repoint track-level artist references. Returns rows affected.
    fn repoint_track_artists(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize>;

    /// Number of tracks whose track-level artist is the given one.
    fn count_tracks_with_artist(&self, artist_id: i64) -> Result<usize>;

    /// Move a track under another medium, keeping its track number.
    fn reassign_track_media(&self, track_id: i64, release_media_id: i64) -> Result<()>;

    // =========================================================================
    // Labels
    // =========================================================================

    fn create_label(&self, label: &Label, images: &[Image]) -> Result<i64>;

    fn get_label(&self, id: i64) -> Result<Option<Label>>;

    fn find_label_by_name(&self, key: &SearchKey) -> Result<Option<Label>>;

    fn update_label(&self, label: &Label) -> Result<()>;

    fn delete_label(&self, id: i64) -> Result<()>;

    // =========================================================================
    // Release <-> Label associations
    // =========================================================================

    /// Insert the association if absent; an existing pair is left untouched.
    fn associate_release_label(&self, release_label: &ReleaseLabel) -> Result<()>;

    fn list_release_labels(&self, release_id: i64) -> Result<Vec<ReleaseLabel>>;

    fn count_release_labels_for_label(&self, label_id: i64) -> Result<usize>;

    /// Repoint associations from one label to another, dropping pairs that
    /// would collide. Returns rows repointed.
    fn repoint_release_labels(&self, from_label_id: i64, to_label_id: i64) -> Result<usize>;

    // =========================================================================
    // Genres
    // =========================================================================

    /// Get-or-create a genre row by normalized name. Returns its id.
    fn upsert_genre(&self, name: &str) -> Result<i64>;

    fn associate_artist_genre(&self, artist_id: i64, genre_id: i64) -> Result<()>;

    fn associate_release_genre(&self, release_id: i64, genre_id: i64) -> Result<()>;

    fn list_artist_genres(&self, artist_id: i64) -> Result<Vec<Genre>>;

    fn list_release_genres(&self, release_id: i64) -> Result<Vec<Genre>>;

    fn repoint_artist_genres(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize>;

    fn repoint_release_genres(&self, from_release_id: i64, to_release_id: i64) -> Result<usize>;

    // =========================================================================
    // Images
    // =========================================================================

    fn insert_image(&self, image: &Image) -> Result<i64>;

    fn count_artist_images(&self, artist_id: i64) -> Result<usize>;

    fn count_release_images(&self, release_id: i64) -> Result<usize>;

    fn count_label_images(&self, label_id: i64) -> Result<usize>;

    fn repoint_artist_images(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize>;

    fn repoint_release_images(&self, from_release_id: i64, to_release_id: i64) -> Result<usize>;

    fn repoint_label_images(&self, from_label_id: i64, to_label_id: i64) -> Result<usize>;

    // =========================================================================
    // Counts (for CLI summaries)
    // =========================================================================

    fn get_artists_count(&self) -> usize;

    fn get_releases_count(&self) -> usize;

    fn get_tracks_count(&self) -> usize;
}
