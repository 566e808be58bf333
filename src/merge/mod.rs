//! Duplicate entity merging.
//!
//! Merging absorbs a source entity into a target: target fields win, source
//! fills the gaps, relations are repointed, and colliding children merge
//! recursively (releases by title, tracks by disc and track number). No
//! audio file reference may be lost: a source track row is only dropped once
//! the target's file is confirmed on disk, otherwise the target adopts the
//! source path. The source row is deleted last. With `apply` false the whole
//! plan is computed and reported without writing.

use crate::cache::{region, CacheKind, MetaCache};
use crate::catalog_store::{CatalogStore, Label, MediaStatus, Release, ReleaseMedia, Track};
use crate::normalize::normalize;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// What a merge did, or would do when not applied.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub from_id: i64,
    pub to_id: i64,
    pub applied: bool,
    pub fields_filled: usize,
    pub releases_repointed: usize,
    pub releases_merged: usize,
    pub tracks_moved: usize,
    pub tracks_merged: usize,
    pub files_adopted: usize,
    pub track_artists_repointed: usize,
    pub genres_repointed: usize,
    pub images_repointed: usize,
    pub release_labels_repointed: usize,
}

impl MergeReport {
    fn absorb(&mut self, sub: &MergeReport) {
        self.fields_filled += sub.fields_filled;
        self.tracks_moved += sub.tracks_moved;
        self.tracks_merged += sub.tracks_merged;
        self.files_adopted += sub.files_adopted;
        self.genres_repointed += sub.genres_repointed;
        self.images_repointed += sub.images_repointed;
        self.release_labels_repointed += sub.release_labels_repointed;
    }
}

/// Keep the target value; take the source only when the target has none.
fn fill_scalar(target: &mut Option<String>, source: &Option<String>) -> usize {
    if target.is_none() && source.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false) {
        *target = source.clone();
        1
    } else {
        0
    }
}

/// Add source values the target does not already carry.
fn fill_collection(target: &mut Vec<String>, source: &[String]) -> usize {
    let mut added = 0;
    for value in source {
        if !target.iter().any(|t| t.eq_ignore_ascii_case(value)) {
            target.push(value.clone());
            added += 1;
        }
    }
    added
}

pub struct EntityMerger {
    store: Arc<dyn CatalogStore>,
    cache: Arc<MetaCache>,
}

impl EntityMerger {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<MetaCache>) -> Self {
        Self { store, cache }
    }

    pub fn merge_artists(&self, from_id: i64, to_id: i64, apply: bool) -> Result<MergeReport> {
        if from_id == to_id {
            bail!("Cannot merge an artist into itself");
        }
        let source = self
            .store
            .get_artist(from_id)?
            .with_context(|| format!("No artist with id {}", from_id))?;
        let mut target = self
            .store
            .get_artist(to_id)?
            .with_context(|| format!("No artist with id {}", to_id))?;

        let mut report = MergeReport {
            from_id,
            to_id,
            applied: apply,
            ..Default::default()
        };

        // Target fields win; source fills gaps.
        report.fields_filled += fill_scalar(&mut target.real_name, &source.real_name);
        report.fields_filled += fill_scalar(&mut target.begin_date, &source.begin_date);
        report.fields_filled += fill_scalar(&mut target.end_date, &source.end_date);
        report.fields_filled += fill_scalar(&mut target.profile, &source.profile);
        report.fields_filled += fill_scalar(&mut target.thumbnail_url, &source.thumbnail_url);
        report.fields_filled += fill_scalar(&mut target.musicbrainz_id, &source.musicbrainz_id);
        report.fields_filled += fill_scalar(&mut target.itunes_id, &source.itunes_id);
        report.fields_filled += fill_scalar(&mut target.amg_id, &source.amg_id);
        report.fields_filled += fill_scalar(&mut target.spotify_id, &source.spotify_id);
        report.fields_filled += fill_scalar(&mut target.discogs_id, &source.discogs_id);
        if target.artist_type.is_none() {
            target.artist_type = source.artist_type;
        }
        fill_collection(&mut target.alternate_names, &source.alternate_names);
        fill_collection(&mut target.isni, &source.isni);
        fill_collection(&mut target.tags, &source.tags);
        fill_collection(&mut target.urls, &source.urls);
        if !source.name.eq_ignore_ascii_case(&target.name) {
            fill_collection(&mut target.alternate_names, &[source.name.clone()]);
        }
        target.close_alternate_names();

        // Releases move over; title collisions merge recursively.
        let target_releases = self.store.list_releases_for_artist(to_id)?;
        for source_release in self.store.list_releases_for_artist(from_id)? {
            let source_key = normalize(&source_release.title);
            let collision = target_releases
                .iter()
                .find(|r| normalize(&r.title) == source_key);
            match collision {
                Some(target_release) => {
                    let sub =
                        self.merge_releases(source_release.id, target_release.id, apply)?;
                    report.absorb(&sub);
                    report.releases_merged += 1;
                }
                None => {
                    if apply {
                        self.store
                            .reassign_release_artist(source_release.id, to_id)?;
                    }
                    self.cache
                        .clear_region(&region(CacheKind::Release, source_release.id));
                    report.releases_repointed += 1;
                }
            }
        }

        report.track_artists_repointed = if apply {
            self.store.repoint_track_artists(from_id, to_id)?
        } else {
            self.store.count_tracks_with_artist(from_id)?
        };
        report.genres_repointed = if apply {
            self.store.repoint_artist_genres(from_id, to_id)?
        } else {
            self.count_genre_moves(from_id, to_id)?
        };
        report.images_repointed = if apply {
            self.store.repoint_artist_images(from_id, to_id)?
        } else {
            self.store.count_artist_images(from_id)?
        };

        if apply {
            self.store.update_artist(&target)?;
            // Source goes last so a failure above never orphans anything.
            self.store.delete_artist(from_id)?;
            info!("Merged artist {} into {}", from_id, to_id);
        } else {
            debug!("Artist merge {} -> {} computed, not applied", from_id, to_id);
        }

        self.cache.clear_region(&region(CacheKind::Artist, from_id));
        self.cache.clear_region(&region(CacheKind::Artist, to_id));
        Ok(report)
    }

    fn count_genre_moves(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize> {
        let target: Vec<i64> = self
            .store
            .list_artist_genres(to_artist_id)?
            .into_iter()
            .map(|g| g.id)
            .collect();
        Ok(self
            .store
            .list_artist_genres(from_artist_id)?
            .into_iter()
            .filter(|g| !target.contains(&g.id))
            .count())
    }

    pub fn merge_releases(&self, from_id: i64, to_id: i64, apply: bool) -> Result<MergeReport> {
        if from_id == to_id {
            bail!("Cannot merge a release into itself");
        }
        let source = self
            .store
            .get_release(from_id)?
            .with_context(|| format!("No release with id {}", from_id))?;
        let mut target = self
            .store
            .get_release(to_id)?
            .with_context(|| format!("No release with id {}", to_id))?;

        let mut report = MergeReport {
            from_id,
            to_id,
            applied: apply,
            ..Default::default()
        };

        report.fields_filled += fill_scalar(&mut target.release_date, &source.release_date);
        report.fields_filled += fill_scalar(&mut target.thumbnail_url, &source.thumbnail_url);
        report.fields_filled += fill_scalar(&mut target.musicbrainz_id, &source.musicbrainz_id);
        report.fields_filled += fill_scalar(&mut target.itunes_id, &source.itunes_id);
        report.fields_filled += fill_scalar(&mut target.amg_id, &source.amg_id);
        report.fields_filled += fill_scalar(&mut target.spotify_id, &source.spotify_id);
        report.fields_filled += fill_scalar(&mut target.discogs_id, &source.discogs_id);
        if target.release_type.is_none() {
            target.release_type = source.release_type;
        }
        fill_collection(&mut target.alternate_names, &source.alternate_names);
        fill_collection(&mut target.tags, &source.tags);
        fill_collection(&mut target.urls, &source.urls);
        if !source.title.eq_ignore_ascii_case(&target.title) {
            fill_collection(&mut target.alternate_names, &[source.title.clone()]);
        }
        target.close_alternate_names();

        self.merge_release_children(&source, &target, apply, &mut report)?;

        report.genres_repointed += if apply {
            self.store.repoint_release_genres(from_id, to_id)?
        } else {
            self.count_release_genre_moves(from_id, to_id)?
        };
        report.images_repointed += if apply {
            self.store.repoint_release_images(from_id, to_id)?
        } else {
            self.store.count_release_images(from_id)?
        };
        report.release_labels_repointed += if apply {
            self.repoint_labels_between_releases(from_id, to_id)?
        } else {
            self.count_label_moves_between_releases(from_id, to_id)?
        };

        if apply {
            self.refresh_release_counts(&mut target)?;
            self.store.update_release(&target)?;
            self.store.delete_release(from_id)?;
            info!("Merged release {} into {}", from_id, to_id);
        }

        self.cache.clear_region(&region(CacheKind::Release, from_id));
        self.cache.clear_region(&region(CacheKind::Release, to_id));
        Ok(report)
    }

    fn count_release_genre_moves(&self, from_id: i64, to_id: i64) -> Result<usize> {
        let target: Vec<i64> = self
            .store
            .list_release_genres(to_id)?
            .into_iter()
            .map(|g| g.id)
            .collect();
        Ok(self
            .store
            .list_release_genres(from_id)?
            .into_iter()
            .filter(|g| !target.contains(&g.id))
            .count())
    }

    fn count_label_moves_between_releases(&self, from_id: i64, to_id: i64) -> Result<usize> {
        let existing: Vec<i64> = self
            .store
            .list_release_labels(to_id)?
            .into_iter()
            .map(|rl| rl.label_id)
            .collect();
        Ok(self
            .store
            .list_release_labels(from_id)?
            .into_iter()
            .filter(|rl| !existing.contains(&rl.label_id))
            .count())
    }

    /// Move the source's label associations onto the target release,
    /// dropping pairs the target already has.
    fn repoint_labels_between_releases(&self, from_id: i64, to_id: i64) -> Result<usize> {
        let existing: Vec<i64> = self
            .store
            .list_release_labels(to_id)?
            .into_iter()
            .map(|rl| rl.label_id)
            .collect();
        let mut moved = 0;
        for mut association in self.store.list_release_labels(from_id)? {
            if existing.contains(&association.label_id) {
                continue;
            }
            association.release_id = to_id;
            self.store.associate_release_label(&association)?;
            moved += 1;
        }
        Ok(moved)
    }

    fn merge_release_children(
        &self,
        source: &Release,
        target: &Release,
        apply: bool,
        report: &mut MergeReport,
    ) -> Result<()> {
        let target_media = self.store.list_release_media(target.id)?;

        for source_media in self.store.list_release_media(source.id)? {
            let target_media_id = match target_media
                .iter()
                .find(|m| m.media_number == source_media.media_number)
            {
                Some(m) => m.id,
                None => {
                    let media = ReleaseMedia {
                        id: 0,
                        release_id: target.id,
                        media_number: source_media.media_number,
                        track_count: 0,
                        status: MediaStatus::Incomplete,
                    };
                    if apply {
                        self.store.insert_release_media(&media)?
                    } else {
                        0
                    }
                }
            };

            for source_track in self.store.list_tracks_for_media(source_media.id)? {
                let collision = if target_media_id != 0 {
                    self.store
                        .find_track(target_media_id, source_track.track_number)?
                } else {
                    None
                };
                match collision {
                    Some(target_track) => {
                        self.merge_tracks(&source_track, target_track, apply, report)?;
                        report.tracks_merged += 1;
                    }
                    None => {
                        if apply {
                            self.store
                                .reassign_track_media(source_track.id, target_media_id)?;
                        }
                        report.tracks_moved += 1;
                    }
                }
            }

            if apply {
                self.store.delete_release_media(source_media.id)?;
            }
        }
        Ok(())
    }

    /// Collapse two track rows for the same (disc, number) slot. The target
    /// row survives; its file must be confirmed on disk before the source
    /// row may be dropped, otherwise the target adopts the source's file.
    fn merge_tracks(
        &self,
        source: &Track,
        mut target: Track,
        apply: bool,
        report: &mut MergeReport,
    ) -> Result<()> {
        report.fields_filled += fill_scalar(&mut target.musicbrainz_id, &source.musicbrainz_id);
        report.fields_filled += fill_scalar(&mut target.isrc, &source.isrc);
        report.fields_filled += fill_scalar(&mut target.amg_id, &source.amg_id);
        report.fields_filled += fill_scalar(&mut target.spotify_id, &source.spotify_id);
        if target.duration_ms.is_none() {
            target.duration_ms = source.duration_ms;
        }
        if target.artist_id.is_none() {
            target.artist_id = source.artist_id;
        }
        fill_collection(&mut target.part_titles, &source.part_titles);

        let target_file_ok = target
            .file_path
            .as_deref()
            .map(|p| Path::new(p).is_file())
            .unwrap_or(false);

        if target_file_ok {
            // The target's file is confirmed on disk, so the source's copy
            // is a true duplicate and can go.
            if apply {
                if let Some(source_path) = source
                    .file_path
                    .as_deref()
                    .filter(|p| Some(*p) != target.file_path.as_deref())
                {
                    if Path::new(source_path).is_file() {
                        if let Err(e) = std::fs::remove_file(source_path) {
                            tracing::warn!(
                                "Failed to remove duplicate file {:?}: {}",
                                source_path,
                                e
                            );
                        }
                    }
                }
            }
        } else {
            if let Some(source_path) = &source.file_path {
                target.file_path = Some(source_path.clone());
                target.file_name = source.file_name.clone();
                target.hash = source.hash.clone();
                target.status = source.status;
                report.files_adopted += 1;
                debug!(
                    "Track {} adopts file {:?} from track {}",
                    target.id, source_path, source.id
                );
            }
        }

        if apply {
            self.store.update_track(&target)?;
            self.store.delete_track(source.id)?;
        }
        Ok(())
    }

    fn refresh_release_counts(&self, release: &mut Release) -> Result<()> {
        let media = self.store.list_release_media(release.id)?;
        let mut track_count = 0i32;
        for medium in &media {
            track_count += self.store.list_tracks_for_media(medium.id)?.len() as i32;
        }
        release.media_count = media.len() as i32;
        release.track_count = track_count;
        Ok(())
    }

    pub fn merge_labels(&self, from_id: i64, to_id: i64, apply: bool) -> Result<MergeReport> {
        if from_id == to_id {
            bail!("Cannot merge a label into itself");
        }
        let source = self
            .store
            .get_label(from_id)?
            .with_context(|| format!("No label with id {}", from_id))?;
        let mut target: Label = self
            .store
            .get_label(to_id)?
            .with_context(|| format!("No label with id {}", to_id))?;

        let mut report = MergeReport {
            from_id,
            to_id,
            applied: apply,
            ..Default::default()
        };

        report.fields_filled += fill_scalar(&mut target.musicbrainz_id, &source.musicbrainz_id);
        report.fields_filled += fill_scalar(&mut target.discogs_id, &source.discogs_id);
        report.fields_filled += fill_scalar(&mut target.thumbnail_url, &source.thumbnail_url);
        fill_collection(&mut target.alternate_names, &source.alternate_names);
        if !source.name.eq_ignore_ascii_case(&target.name) {
            fill_collection(&mut target.alternate_names, &[source.name.clone()]);
        }
        target.close_alternate_names();

        report.release_labels_repointed = if apply {
            self.store.repoint_release_labels(from_id, to_id)?
        } else {
            self.store.count_release_labels_for_label(from_id)?
        };
        report.images_repointed = if apply {
            self.store.repoint_label_images(from_id, to_id)?
        } else {
            self.store.count_label_images(from_id)?
        };

        if apply {
            self.store.update_label(&target)?;
            self.store.delete_label(from_id)?;
            info!("Merged label {} into {}", from_id, to_id);
        }

        self.cache.clear_region(&region(CacheKind::Label, from_id));
        self.cache.clear_region(&region(CacheKind::Label, to_id));
        Ok(report)
    }
}
