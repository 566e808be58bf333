//! Multi-provider metadata aggregation.
//!
//! Providers are queried in a fixed order and their candidates merged field
//! by field. Scalar fields keep the first non-empty value, type fields take
//! the last recognized value, collection fields union across all providers.
//! A provider failure is recorded and never aborts the merge.

use crate::catalog_store::{Artist, ArtistType, Label, Release, ReleaseType};
use crate::providers::{
    ArtistCandidate, LabelCandidate, ReleaseCandidate, ReleaseLabelCandidate, SearchProvider,
};
use tracing::{debug, warn};

/// Merged artist metadata plus the side channels that feed genre and image
/// persistence.
#[derive(Debug, Default)]
pub struct ArtistAggregate {
    pub artist: Artist,
    pub genres: Vec<String>,
    pub image_urls: Vec<String>,
    pub errors: Vec<String>,
    pub found: bool,
}

#[derive(Debug, Default)]
pub struct ReleaseAggregate {
    pub release: Release,
    pub genres: Vec<String>,
    pub image_urls: Vec<String>,
    /// Label credits, deduplicated by name; the first provider to report a
    /// catalog number for a label wins.
    pub labels: Vec<ReleaseLabelCandidate>,
    pub errors: Vec<String>,
    pub found: bool,
}

#[derive(Debug, Default)]
pub struct LabelAggregate {
    pub label: Label,
    pub image_urls: Vec<String>,
    pub errors: Vec<String>,
    pub found: bool,
}

/// Keep the first non-empty value.
fn merge_scalar(target: &mut Option<String>, candidate: Option<String>) {
    if target.is_none() {
        *target = candidate.filter(|v| !v.trim().is_empty());
    }
}

/// Accumulate into a collection; the union is sorted and deduplicated once
/// all providers have answered.
fn merge_collection(target: &mut Vec<String>, candidate: Vec<String>) {
    target.extend(
        candidate
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    );
}

fn finalize_collection(values: &mut Vec<String>) {
    values.sort_by_key(|v| v.to_lowercase());
    values.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
}

/// Accumulate label credits, deduplicated by case-insensitive name. A later
/// credit can only contribute a catalog number an earlier one lacked.
fn merge_labels(target: &mut Vec<ReleaseLabelCandidate>, candidates: Vec<ReleaseLabelCandidate>) {
    for candidate in candidates {
        if candidate.name.trim().is_empty() {
            continue;
        }
        match target
            .iter_mut()
            .find(|l| l.name.eq_ignore_ascii_case(&candidate.name))
        {
            Some(existing) => {
                if existing.catalog_number.is_none() {
                    existing.catalog_number = candidate.catalog_number;
                }
            }
            None => target.push(candidate),
        }
    }
}

/// Record a divergent provider name as an alternate instead of discarding it.
fn merge_name(name: &mut Option<String>, alternates: &mut Vec<String>, candidate: Option<String>) {
    let Some(candidate) = candidate.filter(|v| !v.trim().is_empty()) else {
        return;
    };
    match name {
        None => *name = Some(candidate),
        Some(current) => {
            if !current.eq_ignore_ascii_case(&candidate) {
                alternates.push(candidate);
            }
        }
    }
}

/// Map a raw provider artist-type string onto the catalog enum. An unknown
/// assertion maps to `None` so it never overrides a recognized type; the
/// post-merge fallback still classifies it when nothing better arrived.
fn classify_artist_type(raw: &str) -> Option<ArtistType> {
    match raw.to_lowercase().as_str() {
        "person" | "solo" => Some(ArtistType::Person),
        "group" | "band" | "duet" | "trio" => Some(ArtistType::Group),
        "orchestra" => Some(ArtistType::Orchestra),
        "choir" => Some(ArtistType::Choir),
        "character" => Some(ArtistType::Character),
        "other" => None,
        _ => {
            warn!("Unrecognized artist type '{}'", raw);
            None
        }
    }
}

fn classify_release_type(raw: &str) -> Option<ReleaseType> {
    match raw.to_lowercase().as_str() {
        "album" => Some(ReleaseType::Album),
        "ep" => Some(ReleaseType::Ep),
        "single" => Some(ReleaseType::Single),
        "compilation" => Some(ReleaseType::Compilation),
        "broadcast" | "other" | "unknown" => None,
        _ => {
            warn!("Unrecognized release type '{}'", raw);
            None
        }
    }
}

/// Queries the configured providers in order and merges their answers.
pub struct ProviderAggregator {
    providers: Vec<Box<dyn SearchProvider>>,
}

impl ProviderAggregator {
    pub fn new(providers: Vec<Box<dyn SearchProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn aggregate_artist(&self, query: &str) -> ArtistAggregate {
        let mut aggregate = ArtistAggregate::default();
        let mut name = None;
        let mut alternates = Vec::new();
        let mut raw_type_seen = false;

        for provider in &self.providers {
            let candidate = match provider.search_artist(query) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    debug!("{}: no artist match for '{}'", provider.name(), query);
                    continue;
                }
                Err(e) => {
                    warn!("{}: artist search failed: {:#}", provider.name(), e);
                    aggregate.errors.push(format!("{}: {:#}", provider.name(), e));
                    continue;
                }
            };

            aggregate.found = true;
            raw_type_seen |= candidate.artist_type.is_some();
            self.merge_artist_candidate(&mut aggregate, &mut name, &mut alternates, candidate);
        }

        // Classification is total: a type that never mapped onto the enum
        // still yields a value.
        if aggregate.artist.artist_type.is_none() && raw_type_seen {
            aggregate.artist.artist_type = Some(ArtistType::Other);
        }

        aggregate.artist.name = name.unwrap_or_default();
        merge_collection(&mut aggregate.artist.alternate_names, alternates);
        finalize_collection(&mut aggregate.artist.alternate_names);
        finalize_collection(&mut aggregate.artist.isni);
        finalize_collection(&mut aggregate.artist.tags);
        finalize_collection(&mut aggregate.artist.urls);
        finalize_collection(&mut aggregate.genres);
        aggregate
    }

    fn merge_artist_candidate(
        &self,
        aggregate: &mut ArtistAggregate,
        name: &mut Option<String>,
        alternates: &mut Vec<String>,
        candidate: ArtistCandidate,
    ) {
        let artist = &mut aggregate.artist;
        merge_name(name, alternates, candidate.name);
        merge_scalar(&mut artist.real_name, candidate.real_name);
        merge_scalar(&mut artist.begin_date, candidate.begin_date);
        merge_scalar(&mut artist.end_date, candidate.end_date);
        merge_scalar(&mut artist.profile, candidate.profile);
        merge_scalar(&mut artist.thumbnail_url, candidate.thumbnail_url.clone());
        merge_scalar(&mut artist.musicbrainz_id, candidate.musicbrainz_id);
        merge_scalar(&mut artist.itunes_id, candidate.itunes_id);
        merge_scalar(&mut artist.amg_id, candidate.amg_id);
        merge_scalar(&mut artist.spotify_id, candidate.spotify_id);
        merge_scalar(&mut artist.discogs_id, candidate.discogs_id);
        if artist.sort_name.is_empty() {
            if let Some(sort_name) = candidate.sort_name.filter(|s| !s.trim().is_empty()) {
                artist.sort_name = sort_name;
            }
        }
        // Type fields are last-wins; a later provider with a recognized type
        // overrides an earlier one.
        if let Some(raw) = candidate.artist_type {
            if let Some(classified) = classify_artist_type(&raw) {
                artist.artist_type = Some(classified);
            }
        }
        merge_collection(&mut artist.alternate_names, candidate.alternate_names);
        merge_collection(&mut artist.isni, candidate.isni);
        merge_collection(&mut artist.tags, candidate.tags);
        merge_collection(&mut artist.urls, candidate.urls);
        merge_collection(&mut aggregate.genres, candidate.genres);
        merge_collection(&mut aggregate.image_urls, candidate.image_urls);
        if let Some(thumb) = candidate.thumbnail_url {
            aggregate.image_urls.push(thumb);
        }
    }

    pub fn aggregate_release(&self, artist_name: &str, title: &str) -> ReleaseAggregate {
        let mut aggregate = ReleaseAggregate::default();
        let mut merged_title = None;
        let mut alternates = Vec::new();
        let mut raw_type_seen = false;

        for provider in &self.providers {
            let candidate = match provider.search_release(artist_name, title) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    debug!("{}: no release match for '{}'", provider.name(), title);
                    continue;
                }
                Err(e) => {
                    warn!("{}: release search failed: {:#}", provider.name(), e);
                    aggregate.errors.push(format!("{}: {:#}", provider.name(), e));
                    continue;
                }
            };

            aggregate.found = true;
            let release = &mut aggregate.release;
            merge_name(&mut merged_title, &mut alternates, candidate.title);
            merge_scalar(&mut release.release_date, candidate.release_date);
            merge_scalar(&mut release.thumbnail_url, candidate.thumbnail_url.clone());
            merge_scalar(&mut release.musicbrainz_id, candidate.musicbrainz_id);
            merge_scalar(&mut release.itunes_id, candidate.itunes_id);
            merge_scalar(&mut release.amg_id, candidate.amg_id);
            merge_scalar(&mut release.spotify_id, candidate.spotify_id);
            merge_scalar(&mut release.discogs_id, candidate.discogs_id);
            if let Some(raw) = candidate.release_type {
                raw_type_seen = true;
                if let Some(classified) = classify_release_type(&raw) {
                    release.release_type = Some(classified);
                }
            }
            merge_collection(&mut release.alternate_names, candidate.alternate_names);
            merge_collection(&mut release.tags, candidate.tags);
            merge_collection(&mut release.urls, candidate.urls);
            merge_collection(&mut aggregate.genres, candidate.genres);
            merge_collection(&mut aggregate.image_urls, candidate.image_urls);
            merge_labels(&mut aggregate.labels, candidate.labels);
            if let Some(thumb) = candidate.thumbnail_url {
                aggregate.image_urls.push(thumb);
            }
        }

        if aggregate.release.release_type.is_none() && raw_type_seen {
            aggregate.release.release_type = Some(ReleaseType::Unknown);
        }

        aggregate.release.title = merged_title.unwrap_or_default();
        merge_collection(&mut aggregate.release.alternate_names, alternates);
        finalize_collection(&mut aggregate.release.alternate_names);
        finalize_collection(&mut aggregate.release.tags);
        finalize_collection(&mut aggregate.release.urls);
        finalize_collection(&mut aggregate.genres);
        aggregate
    }

    pub fn aggregate_label(&self, query: &str) -> LabelAggregate {
        let mut aggregate = LabelAggregate::default();
        let mut name = None;
        let mut alternates = Vec::new();

        for provider in &self.providers {
            let candidate = match provider.search_label(query) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{}: label search failed: {:#}", provider.name(), e);
                    aggregate.errors.push(format!("{}: {:#}", provider.name(), e));
                    continue;
                }
            };

            aggregate.found = true;
            let label = &mut aggregate.label;
            merge_name(&mut name, &mut alternates, candidate.name);
            if label.sort_name.is_empty() {
                if let Some(sort_name) = candidate.sort_name.filter(|s| !s.trim().is_empty()) {
                    label.sort_name = sort_name;
                }
            }
            merge_scalar(&mut label.musicbrainz_id, candidate.musicbrainz_id);
            merge_scalar(&mut label.discogs_id, candidate.discogs_id);
            merge_scalar(&mut label.thumbnail_url, candidate.thumbnail_url.clone());
            merge_collection(&mut label.alternate_names, candidate.alternate_names);
            merge_collection(&mut aggregate.image_urls, candidate.image_urls);
            if let Some(thumb) = candidate.thumbnail_url {
                aggregate.image_urls.push(thumb);
            }
        }

        aggregate.label.name = name.unwrap_or_default();
        merge_collection(&mut aggregate.label.alternate_names, alternates);
        finalize_collection(&mut aggregate.label.alternate_names);
        aggregate
    }
}
