//! End-to-end resolution tests against an in-memory catalog.

mod common;

use common::{aggregator, empty_aggregator, resolvers, store, StubProvider};
use roadie::catalog_store::{ArtistType, CatalogStore};
use roadie::providers::{ArtistCandidate, ReleaseCandidate, ReleaseLabelCandidate};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_resolve_creates_artist_once() {
    let store = store();
    let provider = Arc::new(StubProvider::with_artist(ArtistCandidate {
        name: Some("Radiohead".into()),
        artist_type: Some("Group".into()),
        tags: vec!["rock".into()],
        genres: vec!["Alternative".into()],
        ..Default::default()
    }));
    let r = resolvers(store.clone(), aggregator(vec![provider.clone()]));

    let first = r.artist.resolve("radiohead", None).unwrap();
    assert!(first.created);
    assert!(first.found);
    assert_eq!(first.entity.name, "Radiohead");
    assert_eq!(first.entity.artist_type, Some(ArtistType::Group));
    assert_eq!(store.list_artist_genres(first.entity.id).unwrap().len(), 1);

    let second = r.artist.resolve("radiohead", None).unwrap();
    assert!(!second.created);
    assert_eq!(second.entity.id, first.entity.id);
    assert_eq!(store.get_artists_count(), 1);
}

#[test]
fn test_cached_resolution_skips_providers() {
    let store = store();
    let provider = Arc::new(StubProvider::with_artist(ArtistCandidate {
        name: Some("Low".into()),
        ..Default::default()
    }));
    let r = resolvers(store, aggregator(vec![provider.clone()]));

    r.artist.resolve("Low", None).unwrap();
    let calls_after_first = provider.calls();
    r.artist.resolve("Low", None).unwrap();
    assert_eq!(provider.calls(), calls_after_first);
}

#[test]
fn test_variant_spelling_resolves_to_same_artist() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let first = r.artist.resolve("Motörhead", None).unwrap();
    let second = r.artist.resolve("MOTORHEAD", None).unwrap();

    assert_eq!(first.entity.id, second.entity.id);
    assert_eq!(store.get_artists_count(), 1);
}

#[test]
fn test_aggregated_name_recheck_prevents_duplicate() {
    let store = store();
    // "R.E.M." already exists under its canonical name.
    let existing_id = common::seed_artist(store.as_ref(), "R.E.M.");

    let provider = Arc::new(StubProvider::with_artist(ArtistCandidate {
        name: Some("R.E.M.".into()),
        ..Default::default()
    }));
    let r = resolvers(store.clone(), aggregator(vec![provider]));

    // The query doesn't match the stored row, but the aggregated name does.
    let outcome = r.artist.resolve("REM band", None).unwrap();
    assert!(!outcome.created);
    assert_eq!(outcome.entity.id, existing_id);
    assert_eq!(store.get_artists_count(), 1);
}

#[test]
fn test_lookup_never_creates() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    assert!(r.artist.lookup("Nobody Yet").unwrap().is_none());
    assert_eq!(store.get_artists_count(), 0);

    let id = common::seed_artist(store.as_ref(), "Neu!");
    let hit = r.artist.lookup("neu").unwrap().unwrap();
    assert_eq!(hit.id, id);
}

#[test]
fn test_no_metadata_still_creates_bare_artist() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let outcome = r.artist.resolve("Some Obscure Band", None).unwrap();
    assert!(outcome.created);
    assert!(!outcome.found);
    assert_eq!(outcome.entity.name, "Some Obscure Band");
    assert!(!outcome.entity.sort_name.is_empty());
}

#[test]
fn test_provider_failure_does_not_abort_resolution() {
    let store = store();
    let broken = Arc::new(StubProvider::failing());
    let working = Arc::new(StubProvider::with_artist(ArtistCandidate {
        name: Some("Can".into()),
        ..Default::default()
    }));
    let r = resolvers(store, aggregator(vec![broken, working]));

    let outcome = r.artist.resolve("Can", None).unwrap();
    assert!(outcome.created);
    assert!(outcome.found);
    assert_eq!(outcome.errors.len(), 1);
}

#[test]
fn test_sidecar_overrides_providers() {
    let store = store();
    // A failing provider proves the sidecar short-circuits aggregation.
    let broken = Arc::new(StubProvider::failing());
    let r = resolvers(store, aggregator(vec![broken.clone()]));

    let folder = TempDir::new().unwrap();
    fs::write(
        folder.path().join("roadie.artist.json"),
        r#"{
            "name": "Nick Drake",
            "sort_name": "Drake, Nick",
            "artist_type": "Person",
            "tags": ["folk"]
        }"#,
    )
    .unwrap();

    let outcome = r
        .artist
        .resolve("nick drake", Some(folder.path()))
        .unwrap();
    assert!(outcome.created);
    assert!(outcome.found);
    assert!(outcome.errors.is_empty());
    assert_eq!(broken.calls(), 0);
    assert_eq!(outcome.entity.sort_name, "Drake, Nick");
    assert_eq!(outcome.entity.artist_type, Some(ArtistType::Person));
}

#[test]
fn test_release_resolution_scoped_to_artist() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let artist_a = r.artist.resolve("Artist A", None).unwrap().entity;
    let artist_b = r.artist.resolve("Artist B", None).unwrap().entity;

    let release_a = r.release.resolve(&artist_a, "Greatest Hits", None).unwrap();
    let release_b = r.release.resolve(&artist_b, "Greatest Hits", None).unwrap();

    assert!(release_a.created);
    assert!(release_b.created);
    assert_ne!(release_a.entity.id, release_b.entity.id);
    assert_eq!(store.get_releases_count(), 2);

    // Same artist and title hits the existing row.
    let again = r.release.resolve(&artist_a, "Greatest Hits", None).unwrap();
    assert!(!again.created);
    assert_eq!(again.entity.id, release_a.entity.id);
}

#[test]
fn test_release_metadata_from_provider() {
    let store = store();
    let provider = Arc::new(StubProvider::with_release(ReleaseCandidate {
        title: Some("OK Computer".into()),
        release_date: Some("1997-05-21".into()),
        release_type: Some("Album".into()),
        genres: vec!["Rock".into()],
        ..Default::default()
    }));
    let r = resolvers(store.clone(), aggregator(vec![provider]));

    let artist = r.artist.resolve("Radiohead", None).unwrap().entity;
    let outcome = r.release.resolve(&artist, "ok computer", None).unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.entity.title, "OK Computer");
    assert_eq!(outcome.entity.release_date.as_deref(), Some("1997-05-21"));
    assert_eq!(store.list_release_genres(outcome.entity.id).unwrap().len(), 1);
}

#[test]
fn test_release_label_credit_creates_association() {
    let store = store();
    let provider = Arc::new(StubProvider::with_release(ReleaseCandidate {
        title: Some("Music Has the Right to Children".into()),
        labels: vec![ReleaseLabelCandidate {
            name: "Warp".into(),
            catalog_number: Some("WARPCD55".into()),
        }],
        ..Default::default()
    }));
    let r = resolvers(store.clone(), aggregator(vec![provider]));

    let artist = r.artist.resolve("Boards of Canada", None).unwrap().entity;
    let outcome = r
        .release
        .resolve(&artist, "Music Has the Right to Children", None)
        .unwrap();

    let associations = store.list_release_labels(outcome.entity.id).unwrap();
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].catalog_number.as_deref(), Some("WARPCD55"));

    let label = store.get_label(associations[0].label_id).unwrap().unwrap();
    assert_eq!(label.name, "Warp");

    // A second resolution hits the existing release and adds nothing.
    let again = r
        .release
        .resolve(&artist, "Music Has the Right to Children", None)
        .unwrap();
    assert!(!again.created);
    assert_eq!(store.list_release_labels(outcome.entity.id).unwrap().len(), 1);
}

#[test]
fn test_label_resolution_idempotent() {
    let store = store();
    let r = resolvers(store.clone(), empty_aggregator());

    let first = r.label.resolve("Warp Records").unwrap();
    let second = r.label.resolve("warp records").unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.entity.id, second.entity.id);
}
