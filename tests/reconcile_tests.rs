//! Folder reconciliation driven through the resolvers, as the CLI wires it.

mod common;

use common::{empty_aggregator, resolvers, store, StubTagReader};
use roadie::catalog_store::{CatalogStore, LibraryStatus, ReleaseStatus, TrackStatus};
use roadie::reconcile::{AudioTags, FolderReconciler};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn tags(title: &str, artist: &str, track: u32, total: Option<u32>) -> AudioTags {
    AudioTags {
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
        album: Some("Album".to_string()),
        track_number: Some(track),
        track_total: total,
        duration_ms: Some(200_000),
        ..Default::default()
    }
}

#[test]
fn test_resolve_then_reconcile_populates_release() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let artist = r.artist.resolve("Slowdive", None).unwrap().entity;
    let release = r.release.resolve(&artist, "Souvlaki", None).unwrap().entity;

    let folder = TempDir::new().unwrap();
    let reader = Arc::new(StubTagReader::default());
    for (name, track) in [("01.flac", 1), ("02.flac", 2)] {
        fs::write(folder.path().join(name), b"audio").unwrap();
        reader.set(name, tags(&format!("Track {}", track), "Slowdive", track, Some(2)));
    }

    let reconciler = FolderReconciler::new(store.clone(), reader, r.artist.clone());
    let report = reconciler
        .reconcile(release.id, folder.path(), false)
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.tracks_discovered, 2);
    assert_eq!(report.status, ReleaseStatus::Complete);
    assert_eq!(report.library_status, LibraryStatus::Complete);

    let stored = store.get_release(release.id).unwrap().unwrap();
    assert_eq!(stored.track_count, 2);
    assert_eq!(stored.media_count, 1);
    let tracks = store.list_tracks_for_release(release.id).unwrap();
    assert!(tracks.iter().all(|t| t.status == TrackStatus::Ok));
    // Performer matches the release artist, so no track-level artist is set.
    assert!(tracks.iter().all(|t| t.artist_id.is_none()));
}

#[test]
fn test_guest_performer_creates_track_artist() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let artist = r.artist.resolve("Main Act", None).unwrap().entity;
    let release = r.release.resolve(&artist, "Collab", None).unwrap().entity;

    let folder = TempDir::new().unwrap();
    let reader = Arc::new(StubTagReader::default());
    fs::write(folder.path().join("01.mp3"), b"audio").unwrap();
    reader.set("01.mp3", tags("Duet", "Guest Singer", 1, Some(1)));

    let reconciler = FolderReconciler::new(store.clone(), reader, r.artist.clone());
    let report = reconciler
        .reconcile(release.id, folder.path(), false)
        .unwrap();

    assert!(report.is_clean());
    // The guest was resolved into a real artist row.
    assert_eq!(store.get_artists_count(), 2);
    let tracks = store.list_tracks_for_release(release.id).unwrap();
    let guest_id = tracks[0].artist_id.expect("track artist set");
    let guest = store.get_artist(guest_id).unwrap().unwrap();
    assert_eq!(guest.name, "Guest Singer");
}

#[test]
fn test_moved_file_is_rediscovered_not_duplicated() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let artist = r.artist.resolve("Mover", None).unwrap().entity;
    let release = r.release.resolve(&artist, "Shifty", None).unwrap().entity;

    let folder = TempDir::new().unwrap();
    let reader = Arc::new(StubTagReader::default());
    fs::write(folder.path().join("old-name.mp3"), b"audio").unwrap();
    reader.set("old-name.mp3", tags("Same Song", "Mover", 1, Some(1)));

    let reconciler = FolderReconciler::new(store.clone(), reader.clone(), r.artist.clone());
    reconciler
        .reconcile(release.id, folder.path(), false)
        .unwrap();

    // File renamed between scans; same disc and track number.
    fs::rename(
        folder.path().join("old-name.mp3"),
        folder.path().join("new-name.mp3"),
    )
    .unwrap();
    reader.set("new-name.mp3", tags("Same Song", "Mover", 1, Some(1)));

    let report = reconciler
        .reconcile(release.id, folder.path(), false)
        .unwrap();

    assert_eq!(report.tracks_discovered, 0);
    assert_eq!(report.tracks_updated, 1);
    assert_eq!(report.tracks_missing, 0);
    assert_eq!(store.get_tracks_count(), 1);
    let tracks = store.list_tracks_for_release(release.id).unwrap();
    assert!(tracks[0]
        .file_path
        .as_deref()
        .unwrap()
        .ends_with("new-name.mp3"));
}

#[test]
fn test_incomplete_library_reported_from_tag_totals() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let artist = r.artist.resolve("Partial", None).unwrap().entity;
    let release = r.release.resolve(&artist, "Half", None).unwrap().entity;

    // Tags claim 10 tracks; only 2 contiguous ones are on disk.
    let folder = TempDir::new().unwrap();
    let reader = Arc::new(StubTagReader::default());
    for (name, track) in [("01.mp3", 1), ("02.mp3", 2)] {
        fs::write(folder.path().join(name), b"audio").unwrap();
        reader.set(name, tags(&format!("T{}", track), "Partial", track, Some(10)));
    }

    let reconciler = FolderReconciler::new(store.clone(), reader, r.artist.clone());
    let report = reconciler
        .reconcile(release.id, folder.path(), false)
        .unwrap();

    // Contiguous run, so the release itself is fine, but the library does
    // not hold everything the tags claim exists.
    assert_eq!(report.status, ReleaseStatus::Complete);
    assert_eq!(report.library_status, LibraryStatus::Incomplete);
}

#[test]
fn test_non_audio_files_ignored() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let artist = r.artist.resolve("Tidy", None).unwrap().entity;
    let release = r.release.resolve(&artist, "Neat", None).unwrap().entity;

    let folder = TempDir::new().unwrap();
    let reader = Arc::new(StubTagReader::default());
    fs::write(folder.path().join("cover.jpg"), b"img").unwrap();
    fs::write(folder.path().join("notes.txt"), b"text").unwrap();
    fs::write(folder.path().join("01.mp3"), b"audio").unwrap();
    reader.set("01.mp3", tags("Only", "Tidy", 1, Some(1)));

    let reconciler = FolderReconciler::new(store.clone(), reader, r.artist.clone());
    let report = reconciler
        .reconcile(release.id, folder.path(), false)
        .unwrap();

    assert_eq!(report.files_seen, 1);
    assert_eq!(report.tracks_discovered, 1);
    assert!(report.is_clean());
}
