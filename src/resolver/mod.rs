//! Canonical entity resolution.
//!
//! Resolution order for every entity kind: cache, store name match, sidecar
//! override or provider aggregation, re-check under the aggregated name,
//! insert, cache populate. The re-check keeps inserts idempotent when the
//! aggregated name differs from the query ("REM" resolving to "R.E.M.").

use crate::aggregator::ProviderAggregator;
use crate::cache::{region, CacheKind, MetaCache};
use crate::catalog_store::{
    validate_artist, validate_label, validate_release, Artist, CatalogStore, Image, ImageStatus,
    Label, Release, ReleaseLabel,
};
use crate::images::ImageCollector;
use crate::normalize::{normalize, sort_name_for, SearchKey};
use crate::providers::ReleaseLabelCandidate;
use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Folder sidecar carrying a hand-maintained artist override.
pub const ARTIST_SIDECAR: &str = "roadie.artist.json";
/// Folder sidecar carrying a hand-maintained release override.
pub const RELEASE_SIDECAR: &str = "roadie.release.json";

/// Result of one resolution call.
#[derive(Debug)]
pub struct ResolveOutcome<T> {
    pub entity: T,
    /// Whether any metadata source (sidecar or provider) had a match. An
    /// entity is still inserted from the bare query name when false.
    pub found: bool,
    /// Whether this call inserted a new row.
    pub created: bool,
    pub errors: Vec<String>,
}

fn cache_key(key: &SearchKey) -> String {
    if key.alphanumeric.is_empty() {
        key.display.clone()
    } else {
        key.alphanumeric.clone()
    }
}

fn read_sidecar<T: serde::de::DeserializeOwned>(folder: &Path, file_name: &str) -> Option<T> {
    let path = folder.join(file_name);
    if !path.is_file() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(parsed) => {
                info!("Using sidecar {:?}", path);
                Some(parsed)
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed sidecar {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read sidecar {:?}: {}", path, e);
            None
        }
    }
}

pub struct ArtistResolver {
    store: Arc<dyn CatalogStore>,
    cache: Arc<MetaCache>,
    aggregator: Arc<ProviderAggregator>,
    collector: Arc<ImageCollector>,
}

impl ArtistResolver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<MetaCache>,
        aggregator: Arc<ProviderAggregator>,
        collector: Arc<ImageCollector>,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            collector,
        }
    }

    /// Cache and store match only; never creates. `Ok(None)` means the
    /// catalog has no row for the name.
    pub fn lookup(&self, raw_name: &str) -> Result<Option<Artist>> {
        let query_key = normalize(raw_name);
        if query_key.is_empty() {
            bail!("Cannot resolve an empty artist name");
        }
        self.lookup_key(&query_key)
    }

    fn lookup_key(&self, query_key: &SearchKey) -> Result<Option<Artist>> {
        // Cache first. A stale entry whose row has gone falls through.
        if let Some(id) = self.cache.get(CacheKind::Artist, &cache_key(query_key)) {
            if let Some(artist) = self.store.get_artist(id)? {
                debug!("Artist cache hit for '{}'", query_key.display);
                return Ok(Some(artist));
            }
        }
        if let Some(artist) = self.store.find_artist_by_name(query_key)? {
            self.populate_cache(&artist, query_key);
            return Ok(Some(artist));
        }
        Ok(None)
    }

    pub fn resolve(&self, raw_name: &str, folder: Option<&Path>) -> Result<ResolveOutcome<Artist>> {
        let query_key = normalize(raw_name);
        if query_key.is_empty() {
            bail!("Cannot resolve an empty artist name");
        }

        if let Some(artist) = self.lookup_key(&query_key)? {
            return Ok(ResolveOutcome {
                entity: artist,
                found: true,
                created: false,
                errors: Vec::new(),
            });
        }

        // Sidecar bypasses aggregation entirely.
        let sidecar: Option<Artist> =
            folder.and_then(|f| read_sidecar(f, ARTIST_SIDECAR));

        let (mut artist, genres, image_urls, errors, found) = match sidecar {
            Some(artist) => (artist, Vec::new(), Vec::new(), Vec::new(), true),
            None => {
                let aggregate = self.aggregator.aggregate_artist(&query_key.display);
                (
                    aggregate.artist,
                    aggregate.genres,
                    aggregate.image_urls,
                    aggregate.errors,
                    aggregate.found,
                )
            }
        };

        if artist.name.trim().is_empty() {
            artist.name = raw_name.trim().to_string();
        }
        if artist.roadie_id.is_empty() {
            artist.roadie_id = Uuid::new_v4().to_string();
        }
        if artist.sort_name.trim().is_empty() {
            artist.sort_name = sort_name_for(&artist.name);
        }
        artist.close_alternate_names();
        validate_artist(&artist)?;

        // The aggregated name can differ from the query; re-check so the
        // insert stays idempotent.
        let final_key = normalize(&artist.name);
        if final_key != query_key {
            if let Some(existing) = self.store.find_artist_by_name(&final_key)? {
                self.populate_cache(&existing, &query_key);
                return Ok(ResolveOutcome {
                    entity: existing,
                    found: true,
                    created: false,
                    errors,
                });
            }
        }

        let images = collect_images(&self.collector, &image_urls);
        let id = self.store.create_artist(&artist, &genres, &images)?;
        artist.id = id;
        info!("Created artist '{}' (id {})", artist.name, id);

        self.populate_cache(&artist, &query_key);
        Ok(ResolveOutcome {
            entity: artist,
            found,
            created: true,
            errors,
        })
    }

    fn populate_cache(&self, artist: &Artist, query_key: &SearchKey) {
        let owner = region(CacheKind::Artist, artist.id);
        self.cache
            .put(CacheKind::Artist, &cache_key(query_key), artist.id, &owner);
        let name_key = normalize(&artist.name);
        if name_key != *query_key {
            self.cache
                .put(CacheKind::Artist, &cache_key(&name_key), artist.id, &owner);
        }
    }
}

/// Seam used by the folder reconciler to resolve track-level artists.
pub trait TrackArtistLookup: Send + Sync {
    /// Resolve a performer name to an artist id, creating the artist when
    /// unknown. Empty names map to `None`.
    fn track_artist_id(&self, name: &str) -> Result<Option<i64>>;
}

impl TrackArtistLookup for ArtistResolver {
    fn track_artist_id(&self, name: &str) -> Result<Option<i64>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let outcome = self.resolve(name, None)?;
        Ok(Some(outcome.entity.id))
    }
}

pub struct ReleaseResolver {
    store: Arc<dyn CatalogStore>,
    cache: Arc<MetaCache>,
    aggregator: Arc<ProviderAggregator>,
    collector: Arc<ImageCollector>,
    label_resolver: Option<Arc<LabelResolver>>,
}

impl ReleaseResolver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<MetaCache>,
        aggregator: Arc<ProviderAggregator>,
        collector: Arc<ImageCollector>,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            collector,
            label_resolver: None,
        }
    }

    /// Enable label-credit resolution. Without it aggregated label credits
    /// are dropped.
    pub fn with_label_resolver(mut self, label_resolver: Arc<LabelResolver>) -> Self {
        self.label_resolver = Some(label_resolver);
        self
    }

    /// Releases are scoped to their artist, so the cache key carries the
    /// artist id.
    fn release_cache_key(artist_id: i64, key: &SearchKey) -> String {
        format!("{}:{}", artist_id, cache_key(key))
    }

    /// Cache and store match only; never creates.
    pub fn lookup(&self, artist: &Artist, raw_title: &str) -> Result<Option<Release>> {
        let query_key = normalize(raw_title);
        if query_key.is_empty() {
            bail!("Cannot resolve an empty release title");
        }
        self.lookup_key(artist.id, &query_key)
    }

    fn lookup_key(&self, artist_id: i64, query_key: &SearchKey) -> Result<Option<Release>> {
        let scoped_key = Self::release_cache_key(artist_id, query_key);
        if let Some(id) = self.cache.get(CacheKind::Release, &scoped_key) {
            if let Some(release) = self.store.get_release(id)? {
                debug!("Release cache hit for '{}'", query_key.display);
                return Ok(Some(release));
            }
        }
        if let Some(release) = self.store.find_release_by_title(artist_id, query_key)? {
            self.populate_cache(&release, query_key);
            return Ok(Some(release));
        }
        Ok(None)
    }

    pub fn resolve(
        &self,
        artist: &Artist,
        raw_title: &str,
        folder: Option<&Path>,
    ) -> Result<ResolveOutcome<Release>> {
        let query_key = normalize(raw_title);
        if query_key.is_empty() {
            bail!("Cannot resolve an empty release title");
        }

        if let Some(release) = self.lookup_key(artist.id, &query_key)? {
            return Ok(ResolveOutcome {
                entity: release,
                found: true,
                created: false,
                errors: Vec::new(),
            });
        }

        let sidecar: Option<Release> =
            folder.and_then(|f| read_sidecar(f, RELEASE_SIDECAR));

        let (mut release, genres, image_urls, labels, mut errors, found) = match sidecar {
            Some(release) => (release, Vec::new(), Vec::new(), Vec::new(), Vec::new(), true),
            None => {
                let aggregate = self
                    .aggregator
                    .aggregate_release(&artist.name, &query_key.display);
                (
                    aggregate.release,
                    aggregate.genres,
                    aggregate.image_urls,
                    aggregate.labels,
                    aggregate.errors,
                    aggregate.found,
                )
            }
        };

        if release.title.trim().is_empty() {
            release.title = raw_title.trim().to_string();
        }
        if release.roadie_id.is_empty() {
            release.roadie_id = Uuid::new_v4().to_string();
        }
        release.artist_id = artist.id;
        release.close_alternate_names();
        validate_release(&release)?;

        let final_key = normalize(&release.title);
        if final_key != query_key {
            if let Some(existing) = self.store.find_release_by_title(artist.id, &final_key)? {
                self.populate_cache(&existing, &query_key);
                return Ok(ResolveOutcome {
                    entity: existing,
                    found: true,
                    created: false,
                    errors,
                });
            }
        }

        let images = collect_images(&self.collector, &image_urls);
        let id = self.store.create_release(&release, &genres, &images)?;
        release.id = id;
        info!(
            "Created release '{}' for artist {} (id {})",
            release.title, artist.id, id
        );

        self.attach_labels(id, labels, &mut errors);

        self.populate_cache(&release, &query_key);
        Ok(ResolveOutcome {
            entity: release,
            found,
            created: true,
            errors,
        })
    }

    /// Resolve aggregated label credits and associate them with the release.
    /// A failed credit is that credit's error; the rest still attach.
    fn attach_labels(
        &self,
        release_id: i64,
        labels: Vec<ReleaseLabelCandidate>,
        errors: &mut Vec<String>,
    ) {
        let Some(label_resolver) = &self.label_resolver else {
            return;
        };
        for credit in labels {
            let label_id = match label_resolver.resolve(&credit.name) {
                Ok(outcome) => outcome.entity.id,
                Err(e) => {
                    warn!("Skipping label credit '{}': {:#}", credit.name, e);
                    errors.push(format!("label '{}': {:#}", credit.name, e));
                    continue;
                }
            };
            let association = ReleaseLabel {
                release_id,
                label_id,
                catalog_number: credit.catalog_number,
                begin_date: None,
                end_date: None,
            };
            if let Err(e) = self.store.associate_release_label(&association) {
                errors.push(format!("label '{}': {:#}", credit.name, e));
            }
        }
    }

    fn populate_cache(&self, release: &Release, query_key: &SearchKey) {
        let owner = region(CacheKind::Release, release.id);
        self.cache.put(
            CacheKind::Release,
            &Self::release_cache_key(release.artist_id, query_key),
            release.id,
            &owner,
        );
        let title_key = normalize(&release.title);
        if title_key != *query_key {
            self.cache.put(
                CacheKind::Release,
                &Self::release_cache_key(release.artist_id, &title_key),
                release.id,
                &owner,
            );
        }
    }
}

pub struct LabelResolver {
    store: Arc<dyn CatalogStore>,
    cache: Arc<MetaCache>,
    aggregator: Arc<ProviderAggregator>,
    collector: Arc<ImageCollector>,
}

impl LabelResolver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<MetaCache>,
        aggregator: Arc<ProviderAggregator>,
        collector: Arc<ImageCollector>,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            collector,
        }
    }

    /// Cache and store match only; never creates.
    pub fn lookup(&self, raw_name: &str) -> Result<Option<Label>> {
        let query_key = normalize(raw_name);
        if query_key.is_empty() {
            bail!("Cannot resolve an empty label name");
        }
        self.lookup_key(&query_key)
    }

    fn lookup_key(&self, query_key: &SearchKey) -> Result<Option<Label>> {
        if let Some(id) = self.cache.get(CacheKind::Label, &cache_key(query_key)) {
            if let Some(label) = self.store.get_label(id)? {
                return Ok(Some(label));
            }
        }
        if let Some(label) = self.store.find_label_by_name(query_key)? {
            self.populate_cache(&label, query_key);
            return Ok(Some(label));
        }
        Ok(None)
    }

    pub fn resolve(&self, raw_name: &str) -> Result<ResolveOutcome<Label>> {
        let query_key = normalize(raw_name);
        if query_key.is_empty() {
            bail!("Cannot resolve an empty label name");
        }

        if let Some(label) = self.lookup_key(&query_key)? {
            return Ok(ResolveOutcome {
                entity: label,
                found: true,
                created: false,
                errors: Vec::new(),
            });
        }

        let aggregate = self.aggregator.aggregate_label(&query_key.display);
        let mut label = aggregate.label;
        let errors = aggregate.errors;
        let found = aggregate.found;

        if label.name.trim().is_empty() {
            label.name = raw_name.trim().to_string();
        }
        if label.roadie_id.is_empty() {
            label.roadie_id = Uuid::new_v4().to_string();
        }
        if label.sort_name.trim().is_empty() {
            label.sort_name = sort_name_for(&label.name);
        }
        label.close_alternate_names();
        validate_label(&label)?;

        let final_key = normalize(&label.name);
        if final_key != query_key {
            if let Some(existing) = self.store.find_label_by_name(&final_key)? {
                self.populate_cache(&existing, &query_key);
                return Ok(ResolveOutcome {
                    entity: existing,
                    found: true,
                    created: false,
                    errors,
                });
            }
        }

        let images = collect_images(&self.collector, &aggregate.image_urls);
        let id = self.store.create_label(&label, &images)?;
        label.id = id;
        info!("Created label '{}' (id {})", label.name, id);

        self.populate_cache(&label, &query_key);
        Ok(ResolveOutcome {
            entity: label,
            found,
            created: true,
            errors,
        })
    }

    fn populate_cache(&self, label: &Label, query_key: &SearchKey) {
        let owner = region(CacheKind::Label, label.id);
        self.cache
            .put(CacheKind::Label, &cache_key(query_key), label.id, &owner);
        let name_key = normalize(&label.name);
        if name_key != *query_key {
            self.cache
                .put(CacheKind::Label, &cache_key(&name_key), label.id, &owner);
        }
    }
}

fn collect_images(collector: &ImageCollector, urls: &[String]) -> Vec<Image> {
    if urls.is_empty() {
        return Vec::new();
    }
    collector
        .collect(urls)
        .into_iter()
        .map(|collected| Image {
            id: 0,
            url: collected.url,
            signature: collected.signature,
            bytes: collected.bytes,
            artist_id: None,
            release_id: None,
            label_id: None,
            track_id: None,
            status: ImageStatus::New,
        })
        .collect()
}
