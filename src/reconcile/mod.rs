//! Folder reconciliation.
//!
//! Brings one release's database rows in line with the audio files actually
//! present in its folder. Runs in two phases: first every known track is
//! checked for a vanished file, then the folder is walked and each audio
//! file is matched to a track row by (disc, track number). A dry run
//! computes the full report without writing anything.

mod tags;

pub use tags::{AudioTags, LoftyTagReader, TagReader};

use crate::catalog_store::{
    validate_track, CatalogStore, LibraryStatus, MediaStatus, Release, ReleaseMedia,
    ReleaseStatus, Track, TrackStatus,
};
use crate::resolver::TrackArtistLookup;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "m4a", "mp4", "aac", "wav", "wma", "aiff",
];

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Content fingerprint for a scanned file. Any change to the performing
/// artist, the file's mtime or its identifying tags produces a new value and
/// forces a metadata refresh.
pub fn track_fingerprint(artist_id: i64, modified_secs: u64, tags: &AudioTags) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artist_id.to_le_bytes());
    hasher.update(modified_secs.to_le_bytes());
    for field in [&tags.title, &tags.artist, &tags.album] {
        if let Some(value) = field {
            hasher.update(value.as_bytes());
        }
        hasher.update([0u8]);
    }
    hasher.update(tags.track_number.unwrap_or(0).to_le_bytes());
    hasher.update(tags.disc_number.unwrap_or(1).to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub release_id: i64,
    pub files_seen: usize,
    pub tracks_discovered: usize,
    pub tracks_updated: usize,
    pub tracks_unchanged: usize,
    pub tracks_missing: usize,
    pub media_count: i32,
    pub track_count: i32,
    pub status: ReleaseStatus,
    pub library_status: LibraryStatus,
    pub dry_run: bool,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct DiscoveredFile {
    path: String,
    file_name: String,
    tags: AudioTags,
    fingerprint: String,
}

pub struct FolderReconciler {
    store: Arc<dyn CatalogStore>,
    tag_reader: Arc<dyn TagReader>,
    artist_lookup: Arc<dyn TrackArtistLookup>,
}

impl FolderReconciler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        tag_reader: Arc<dyn TagReader>,
        artist_lookup: Arc<dyn TrackArtistLookup>,
    ) -> Self {
        Self {
            store,
            tag_reader,
            artist_lookup,
        }
    }

    pub fn reconcile(
        &self,
        release_id: i64,
        folder: &Path,
        dry_run: bool,
    ) -> Result<ReconcileReport> {
        let mut release = self
            .store
            .get_release(release_id)?
            .with_context(|| format!("No release with id {}", release_id))?;
        let release_artist = self
            .store
            .get_artist(release.artist_id)?
            .with_context(|| format!("No artist with id {}", release.artist_id))?;

        let mut report = ReconcileReport {
            release_id,
            dry_run,
            ..Default::default()
        };

        // Existing state, keyed by (media number, track number).
        let mut media_by_number: BTreeMap<i32, ReleaseMedia> = self
            .store
            .list_release_media(release_id)?
            .into_iter()
            .map(|m| (m.media_number, m))
            .collect();
        let mut tracks_by_key: BTreeMap<(i32, i32), Track> = BTreeMap::new();
        for (media_number, media) in &media_by_number {
            for track in self.store.list_tracks_for_media(media.id)? {
                tracks_by_key.insert((*media_number, track.track_number), track);
            }
        }

        // Phase 1: which known files are gone.
        let mut file_present: BTreeMap<(i32, i32), bool> = BTreeMap::new();
        for (key, track) in &tracks_by_key {
            let present = track
                .file_path
                .as_deref()
                .map(|p| Path::new(p).is_file())
                .unwrap_or(false);
            file_present.insert(*key, present);
        }

        // Phase 2: walk the folder.
        let discovered = self.scan_folder(folder, release.artist_id, &mut report);
        let mut tag_totals: BTreeMap<i32, u32> = BTreeMap::new();
        for ((disc, _), file) in &discovered {
            if let Some(total) = file.tags.track_total {
                let entry = tag_totals.entry(*disc).or_insert(0);
                *entry = (*entry).max(total);
            }
        }

        // Apply discovered files.
        for ((disc, number), file) in discovered {
            let media_id = match media_by_number.get(&disc).map(|m| m.id) {
                Some(id) => id,
                None => {
                    let media = ReleaseMedia {
                        id: 0,
                        release_id,
                        media_number: disc,
                        track_count: 0,
                        status: MediaStatus::Ok,
                    };
                    let id = if dry_run {
                        0
                    } else {
                        self.store.insert_release_media(&media)?
                    };
                    media_by_number.insert(disc, ReleaseMedia { id, ..media });
                    id
                }
            };

            let track_artist_id = self.resolve_track_artist(
                file.tags.artist.as_deref(),
                &release_artist.name,
                &mut report,
            );

            match tracks_by_key.remove(&(disc, number)) {
                Some(mut track) => {
                    let changed = track.hash.as_deref() != Some(file.fingerprint.as_str())
                        || track.file_path.as_deref() != Some(file.path.as_str())
                        || track.status != TrackStatus::Ok;
                    if changed {
                        if let Some(title) = &file.tags.title {
                            track.title = title.clone();
                        }
                        track.duration_ms = file.tags.duration_ms.or(track.duration_ms);
                        track.file_path = Some(file.path.clone());
                        track.file_name = Some(file.file_name.clone());
                        track.hash = Some(file.fingerprint.clone());
                        track.status = TrackStatus::Ok;
                        track.artist_id = track_artist_id;
                        if !dry_run {
                            self.store.update_track(&track)?;
                        }
                        report.tracks_updated += 1;
                    } else {
                        report.tracks_unchanged += 1;
                    }
                    tracks_by_key.insert((disc, number), track);
                    file_present.insert((disc, number), true);
                }
                None => {
                    let title = file
                        .tags
                        .title
                        .clone()
                        .unwrap_or_else(|| stem_of(&file.file_name));
                    let track = Track {
                        id: 0,
                        roadie_id: Uuid::new_v4().to_string(),
                        release_media_id: media_id,
                        title,
                        track_number: number,
                        duration_ms: file.tags.duration_ms,
                        file_path: Some(file.path.clone()),
                        file_name: Some(file.file_name.clone()),
                        hash: Some(file.fingerprint.clone()),
                        status: TrackStatus::Ok,
                        artist_id: track_artist_id,
                        ..Default::default()
                    };
                    if let Err(e) = validate_track(&track) {
                        report.errors.push(format!("{}: {}", file.path, e));
                        continue;
                    }
                    let id = if dry_run { 0 } else { self.store.insert_track(&track)? };
                    tracks_by_key.insert((disc, number), Track { id, ..track });
                    file_present.insert((disc, number), true);
                    report.tracks_discovered += 1;
                }
            }
        }

        // Tracks whose file is gone and was not rediscovered.
        for (key, track) in tracks_by_key.iter_mut() {
            if !file_present.get(key).copied().unwrap_or(false) {
                report.tracks_missing += 1;
                if track.status != TrackStatus::Missing {
                    track.status = TrackStatus::Missing;
                    if !dry_run {
                        self.store.update_track(track)?;
                    }
                }
            }
        }

        // Per-medium contiguity and counts.
        let mut all_media_ok = true;
        let mut total_ok = 0i32;
        let mut expected_total = 0i32;
        for (media_number, media) in media_by_number.iter_mut() {
            let ok_numbers: BTreeSet<i32> = tracks_by_key
                .iter()
                .filter(|((disc, _), t)| disc == media_number && t.status == TrackStatus::Ok)
                .map(|((_, number), _)| *number)
                .collect();
            let ok_count = ok_numbers.len() as i32;
            let contiguous = ok_count > 0
                && ok_numbers.iter().next() == Some(&1)
                && ok_numbers.iter().last() == Some(&ok_count);

            let status = if contiguous {
                MediaStatus::Ok
            } else {
                MediaStatus::Incomplete
            };
            if status != media.status || media.track_count != ok_count {
                media.status = status;
                media.track_count = ok_count;
                if !dry_run && media.id != 0 {
                    self.store.update_release_media(media)?;
                }
            }
            if status != MediaStatus::Ok {
                all_media_ok = false;
            }
            total_ok += ok_count;
            expected_total += tag_totals
                .get(media_number)
                .map(|t| *t as i32)
                .unwrap_or(ok_count);
        }

        // Derived release state.
        release.track_count = total_ok;
        release.media_count = media_by_number.len() as i32;
        release.status = if total_ok == 0 {
            ReleaseStatus::Missing
        } else if report.tracks_missing == 0 && all_media_ok {
            ReleaseStatus::Complete
        } else {
            ReleaseStatus::Incomplete
        };
        release.library_status = if total_ok > 0 && total_ok >= expected_total && all_media_ok {
            LibraryStatus::Complete
        } else {
            LibraryStatus::Incomplete
        };
        if !dry_run {
            self.store.update_release(&release)?;
        }

        report.media_count = release.media_count;
        report.track_count = release.track_count;
        report.status = release.status;
        report.library_status = release.library_status;

        info!(
            "Reconciled release {} against {:?}: {} seen, {} new, {} updated, {} missing{}",
            release_id,
            folder,
            report.files_seen,
            report.tracks_discovered,
            report.tracks_updated,
            report.tracks_missing,
            if dry_run { " (dry run)" } else { "" }
        );
        Ok(report)
    }

    fn scan_folder(
        &self,
        folder: &Path,
        artist_id: i64,
        report: &mut ReconcileReport,
    ) -> BTreeMap<(i32, i32), DiscoveredFile> {
        let mut discovered = BTreeMap::new();

        for entry in WalkDir::new(folder)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_audio_file(path) {
                continue;
            }
            report.files_seen += 1;

            let tags = match self.tag_reader.read(path) {
                Ok(tags) => tags,
                Err(e) => {
                    warn!("Skipping unreadable file {:?}: {:#}", path, e);
                    report.errors.push(format!("{:?}: {:#}", path, e));
                    continue;
                }
            };

            let Some(number) = tags.track_number.filter(|n| *n > 0) else {
                report
                    .errors
                    .push(format!("{:?}: no track number in tags", path));
                continue;
            };
            let disc = tags.disc_number.filter(|d| *d > 0).unwrap_or(1) as i32;

            let modified_secs = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);

            let key = (disc, number as i32);
            if discovered.contains_key(&key) {
                report.errors.push(format!(
                    "{:?}: duplicate disc {} track {}",
                    path, disc, number
                ));
                continue;
            }

            debug!("Discovered disc {} track {} at {:?}", disc, number, path);
            let fingerprint = track_fingerprint(artist_id, modified_secs, &tags);
            discovered.insert(
                key,
                DiscoveredFile {
                    path: path.to_string_lossy().to_string(),
                    file_name: entry.file_name().to_string_lossy().to_string(),
                    tags,
                    fingerprint,
                },
            );
        }
        discovered
    }

    fn resolve_track_artist(
        &self,
        tag_artist: Option<&str>,
        release_artist_name: &str,
        report: &mut ReconcileReport,
    ) -> Option<i64> {
        let performer = tag_artist?.trim();
        if performer.is_empty() || performer.eq_ignore_ascii_case(release_artist_name) {
            return None;
        }
        match self.artist_lookup.track_artist_id(performer) {
            Ok(id) => id,
            Err(e) => {
                report
                    .errors
                    .push(format!("track artist '{}': {:#}", performer, e));
                None
            }
        }
    }
}

fn stem_of(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Artist, SqliteCatalogStore};
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubTagReader {
        by_name: Mutex<HashMap<String, AudioTags>>,
    }

    impl StubTagReader {
        fn new() -> Self {
            Self {
                by_name: Mutex::new(HashMap::new()),
            }
        }

        fn set(&self, file_name: &str, tags: AudioTags) {
            self.by_name
                .lock()
                .unwrap()
                .insert(file_name.to_string(), tags);
        }
    }

    impl TagReader for StubTagReader {
        fn read(&self, path: &Path) -> Result<AudioTags> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.by_name
                .lock()
                .unwrap()
                .get(&name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unreadable"))
        }
    }

    struct NoTrackArtists;

    impl TrackArtistLookup for NoTrackArtists {
        fn track_artist_id(&self, _name: &str) -> Result<Option<i64>> {
            Ok(None)
        }
    }

    struct Fixture {
        store: Arc<SqliteCatalogStore>,
        reader: Arc<StubTagReader>,
        folder: TempDir,
        release_id: i64,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        let artist_id = store
            .create_artist(
                &Artist {
                    roadie_id: Uuid::new_v4().to_string(),
                    name: "Artist".to_string(),
                    sort_name: "Artist".to_string(),
                    ..Default::default()
                },
                &[],
                &[],
            )
            .unwrap();
        let release_id = store
            .create_release(
                &Release {
                    roadie_id: Uuid::new_v4().to_string(),
                    artist_id,
                    title: "Album".to_string(),
                    ..Default::default()
                },
                &[],
                &[],
            )
            .unwrap();
        Fixture {
            store,
            reader: Arc::new(StubTagReader::new()),
            folder: TempDir::new().unwrap(),
            release_id,
        }
    }

    fn reconciler(f: &Fixture) -> FolderReconciler {
        FolderReconciler::new(f.store.clone(), f.reader.clone(), Arc::new(NoTrackArtists))
    }

    fn add_file(f: &Fixture, name: &str, track: u32, total: Option<u32>) {
        fs::write(f.folder.path().join(name), b"audio").unwrap();
        f.reader.set(
            name,
            AudioTags {
                title: Some(format!("Song {}", track)),
                artist: Some("Artist".to_string()),
                album: Some("Album".to_string()),
                track_number: Some(track),
                track_total: total,
                duration_ms: Some(180_000),
                ..Default::default()
            },
        );
    }

    #[test]
    fn test_discovery_creates_media_and_tracks() {
        let f = fixture();
        add_file(&f, "01.mp3", 1, Some(2));
        add_file(&f, "02.mp3", 2, Some(2));

        let report = reconciler(&f)
            .reconcile(f.release_id, f.folder.path(), false)
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.files_seen, 2);
        assert_eq!(report.tracks_discovered, 2);
        assert_eq!(report.track_count, 2);
        assert_eq!(report.media_count, 1);
        assert_eq!(report.status, ReleaseStatus::Complete);
        assert_eq!(report.library_status, LibraryStatus::Complete);

        let release = f.store.get_release(f.release_id).unwrap().unwrap();
        assert_eq!(release.track_count, 2);
        assert_eq!(release.status, ReleaseStatus::Complete);
    }

    #[test]
    fn test_gap_in_track_numbers_marks_media_incomplete() {
        let f = fixture();
        add_file(&f, "01.mp3", 1, Some(3));
        add_file(&f, "03.mp3", 3, Some(3));

        let report = reconciler(&f)
            .reconcile(f.release_id, f.folder.path(), false)
            .unwrap();

        assert_eq!(report.status, ReleaseStatus::Incomplete);
        assert_eq!(report.library_status, LibraryStatus::Incomplete);
        let media = f.store.list_release_media(f.release_id).unwrap();
        assert_eq!(media[0].status, MediaStatus::Incomplete);
    }

    #[test]
    fn test_missing_file_marks_track_missing() {
        let f = fixture();
        add_file(&f, "01.mp3", 1, None);
        let r = reconciler(&f);
        r.reconcile(f.release_id, f.folder.path(), false).unwrap();

        fs::remove_file(f.folder.path().join("01.mp3")).unwrap();
        let report = r.reconcile(f.release_id, f.folder.path(), false).unwrap();

        assert_eq!(report.tracks_missing, 1);
        assert_eq!(report.status, ReleaseStatus::Missing);
        let tracks = f.store.list_tracks_for_release(f.release_id).unwrap();
        assert_eq!(tracks[0].status, TrackStatus::Missing);
    }

    #[test]
    fn test_second_scan_is_idempotent() {
        let f = fixture();
        add_file(&f, "01.mp3", 1, Some(1));
        let r = reconciler(&f);
        r.reconcile(f.release_id, f.folder.path(), false).unwrap();

        let report = r.reconcile(f.release_id, f.folder.path(), false).unwrap();
        assert_eq!(report.tracks_discovered, 0);
        assert_eq!(report.tracks_updated, 0);
        assert_eq!(report.tracks_unchanged, 1);
        assert_eq!(f.store.get_tracks_count(), 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let f = fixture();
        add_file(&f, "01.mp3", 1, Some(1));

        let report = reconciler(&f)
            .reconcile(f.release_id, f.folder.path(), true)
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.tracks_discovered, 1);
        assert_eq!(f.store.get_tracks_count(), 0);
        assert!(f.store.list_release_media(f.release_id).unwrap().is_empty());
        let release = f.store.get_release(f.release_id).unwrap().unwrap();
        assert_eq!(release.status, ReleaseStatus::New);
    }

    #[test]
    fn test_unreadable_file_is_reported_not_fatal() {
        let f = fixture();
        add_file(&f, "01.mp3", 1, None);
        fs::write(f.folder.path().join("broken.mp3"), b"junk").unwrap();

        let report = reconciler(&f)
            .reconcile(f.release_id, f.folder.path(), false)
            .unwrap();

        assert_eq!(report.tracks_discovered, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_blank_tag_title_is_rejected_not_inserted() {
        let f = fixture();
        fs::write(f.folder.path().join("01.mp3"), b"audio").unwrap();
        f.reader.set(
            "01.mp3",
            AudioTags {
                title: Some("   ".into()),
                track_number: Some(1),
                ..Default::default()
            },
        );

        let report = reconciler(&f)
            .reconcile(f.release_id, f.folder.path(), false)
            .unwrap();

        assert_eq!(report.tracks_discovered, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(f.store.get_tracks_count(), 0);
    }

    #[test]
    fn test_multi_disc_folders() {
        let f = fixture();
        fs::write(f.folder.path().join("d1t1.mp3"), b"audio").unwrap();
        fs::write(f.folder.path().join("d2t1.mp3"), b"audio").unwrap();
        f.reader.set(
            "d1t1.mp3",
            AudioTags {
                title: Some("One".into()),
                track_number: Some(1),
                disc_number: Some(1),
                ..Default::default()
            },
        );
        f.reader.set(
            "d2t1.mp3",
            AudioTags {
                title: Some("Two".into()),
                track_number: Some(1),
                disc_number: Some(2),
                ..Default::default()
            },
        );

        let report = reconciler(&f)
            .reconcile(f.release_id, f.folder.path(), false)
            .unwrap();

        assert_eq!(report.media_count, 2);
        assert_eq!(report.track_count, 2);
        assert_eq!(f.store.list_release_media(f.release_id).unwrap().len(), 2);
    }

    #[test]
    fn test_fingerprint_changes_with_tags() {
        let tags_a = AudioTags {
            title: Some("One".into()),
            track_number: Some(1),
            ..Default::default()
        };
        let tags_b = AudioTags {
            title: Some("Two".into()),
            track_number: Some(1),
            ..Default::default()
        };
        assert_ne!(
            track_fingerprint(1, 100, &tags_a),
            track_fingerprint(1, 100, &tags_b)
        );
        assert_ne!(
            track_fingerprint(1, 100, &tags_a),
            track_fingerprint(1, 200, &tags_a)
        );
        assert_eq!(
            track_fingerprint(1, 100, &tags_a),
            track_fingerprint(1, 100, &tags_a)
        );
    }
}
