//! Common test infrastructure
//!
//! Shared fixtures for the resolver, reconciler and merger integration
//! tests: an in-memory catalog store, configurable stub metadata providers
//! and a stub tag reader, so no test ever touches the network or needs real
//! audio files.

#![allow(dead_code)]

use anyhow::Result;
use roadie::aggregator::ProviderAggregator;
use roadie::cache::MetaCache;
use roadie::catalog_store::{
    Artist, CatalogStore, MediaStatus, Release, ReleaseMedia, SqliteCatalogStore, Track,
    TrackStatus,
};
use roadie::images::ImageCollector;
use roadie::providers::{ArtistCandidate, LabelCandidate, ReleaseCandidate, SearchProvider};
use roadie::reconcile::{AudioTags, TagReader};
use roadie::resolver::{ArtistResolver, LabelResolver, ReleaseResolver};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A scripted provider. Counts calls so tests can assert that cached
/// resolutions skip the providers entirely.
#[derive(Default)]
pub struct StubProvider {
    pub artist: Option<ArtistCandidate>,
    pub release: Option<ReleaseCandidate>,
    pub label: Option<LabelCandidate>,
    pub fail: bool,
    calls: Mutex<usize>,
}

impl StubProvider {
    pub fn with_artist(candidate: ArtistCandidate) -> Self {
        Self {
            artist: Some(candidate),
            ..Default::default()
        }
    }

    pub fn with_release(candidate: ReleaseCandidate) -> Self {
        Self {
            release: Some(candidate),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn bump(&self) {
        *self.calls.lock().unwrap() += 1;
    }
}

impl SearchProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn search_artist(&self, _query: &str) -> Result<Option<ArtistCandidate>> {
        self.bump();
        if self.fail {
            anyhow::bail!("stub provider down");
        }
        Ok(self.artist.clone())
    }

    fn search_release(&self, _artist: &str, _title: &str) -> Result<Option<ReleaseCandidate>> {
        self.bump();
        if self.fail {
            anyhow::bail!("stub provider down");
        }
        Ok(self.release.clone())
    }

    fn search_label(&self, _query: &str) -> Result<Option<LabelCandidate>> {
        self.bump();
        if self.fail {
            anyhow::bail!("stub provider down");
        }
        Ok(self.label.clone())
    }
}

/// Tag reader scripted by file name.
#[derive(Default)]
pub struct StubTagReader {
    by_name: Mutex<HashMap<String, AudioTags>>,
}

impl StubTagReader {
    pub fn set(&self, file_name: &str, tags: AudioTags) {
        self.by_name
            .lock()
            .unwrap()
            .insert(file_name.to_string(), tags);
    }
}

impl TagReader for StubTagReader {
    fn read(&self, path: &Path) -> Result<AudioTags> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.by_name
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no tags scripted for {}", name))
    }
}

pub fn store() -> Arc<SqliteCatalogStore> {
    Arc::new(SqliteCatalogStore::open_in_memory().unwrap())
}

pub fn collector() -> Arc<ImageCollector> {
    Arc::new(ImageCollector::new(5))
}

pub fn aggregator(providers: Vec<Arc<StubProvider>>) -> Arc<ProviderAggregator> {
    struct Shared(Arc<StubProvider>);
    impl SearchProvider for Shared {
        fn name(&self) -> &'static str {
            self.0.name()
        }
        fn search_artist(&self, query: &str) -> Result<Option<ArtistCandidate>> {
            self.0.search_artist(query)
        }
        fn search_release(&self, artist: &str, title: &str) -> Result<Option<ReleaseCandidate>> {
            self.0.search_release(artist, title)
        }
        fn search_label(&self, query: &str) -> Result<Option<LabelCandidate>> {
            self.0.search_label(query)
        }
    }
    Arc::new(ProviderAggregator::new(
        providers
            .into_iter()
            .map(|p| Box::new(Shared(p)) as Box<dyn SearchProvider>)
            .collect(),
    ))
}

pub fn empty_aggregator() -> Arc<ProviderAggregator> {
    Arc::new(ProviderAggregator::new(Vec::new()))
}

pub struct Resolvers {
    pub cache: Arc<MetaCache>,
    pub artist: Arc<ArtistResolver>,
    pub release: Arc<ReleaseResolver>,
    pub label: Arc<LabelResolver>,
}

pub fn resolvers(
    store: Arc<SqliteCatalogStore>,
    aggregator: Arc<ProviderAggregator>,
) -> Resolvers {
    let cache = Arc::new(MetaCache::new());
    let collector = collector();
    let label = Arc::new(LabelResolver::new(
        store.clone(),
        cache.clone(),
        aggregator.clone(),
        collector.clone(),
    ));
    Resolvers {
        cache: cache.clone(),
        artist: Arc::new(ArtistResolver::new(
            store.clone(),
            cache.clone(),
            aggregator.clone(),
            collector.clone(),
        )),
        release: Arc::new(
            ReleaseResolver::new(store, cache, aggregator, collector)
                .with_label_resolver(label.clone()),
        ),
        label,
    }
}

pub fn seed_artist(store: &dyn CatalogStore, name: &str) -> i64 {
    let mut artist = Artist {
        roadie_id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        sort_name: name.to_string(),
        ..Default::default()
    };
    artist.close_alternate_names();
    store.create_artist(&artist, &[], &[]).unwrap()
}

pub fn seed_release(store: &dyn CatalogStore, artist_id: i64, title: &str) -> i64 {
    let mut release = Release {
        roadie_id: Uuid::new_v4().to_string(),
        artist_id,
        title: title.to_string(),
        ..Default::default()
    };
    release.close_alternate_names();
    store.create_release(&release, &[], &[]).unwrap()
}

pub fn seed_media(store: &dyn CatalogStore, release_id: i64, media_number: i32) -> i64 {
    store
        .insert_release_media(&ReleaseMedia {
            id: 0,
            release_id,
            media_number,
            track_count: 0,
            status: MediaStatus::Ok,
        })
        .unwrap()
}

pub fn seed_track(
    store: &dyn CatalogStore,
    media_id: i64,
    number: i32,
    title: &str,
    file_path: Option<&str>,
) -> i64 {
    store
        .insert_track(&Track {
            roadie_id: Uuid::new_v4().to_string(),
            release_media_id: media_id,
            title: title.to_string(),
            track_number: number,
            file_path: file_path.map(|p| p.to_string()),
            file_name: file_path
                .and_then(|p| Path::new(p).file_name())
                .map(|n| n.to_string_lossy().to_string()),
            status: if file_path.is_some() {
                TrackStatus::Ok
            } else {
                TrackStatus::New
            },
            ..Default::default()
        })
        .unwrap()
}
