use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use roadie::aggregator::ProviderAggregator;
use roadie::cache::MetaCache;
use roadie::catalog_store::SqliteCatalogStore;
use roadie::config::{AppConfig, CliConfig, FileConfig, ProviderSettings};
use roadie::images::ImageCollector;
use roadie::merge::EntityMerger;
use roadie::providers::{
    DiscogsClient, ITunesClient, LastFmClient, MusicBrainzClient, SearchProvider, SpotifyClient,
    WikipediaClient,
};
use roadie::reconcile::{FolderReconciler, LoftyTagReader};
use roadie::resolver::{ArtistResolver, LabelResolver, ReleaseResolver};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(about = "Metadata reconciliation for a personal music collection")]
struct CliArgs {
    /// Directory holding the catalog database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Root of the music library.
    #[clap(long, value_parser = parse_path)]
    pub library_root: Option<PathBuf>,

    /// Optional TOML config file; its values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Maximum images persisted per entity.
    #[clap(long, default_value_t = 5)]
    pub max_images: usize,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve an artist (and optionally one of its releases) to canonical
    /// catalog entries, creating them if needed.
    Resolve {
        /// Artist name to resolve.
        #[clap(long)]
        artist: String,
        /// Release title to resolve under the artist.
        #[clap(long)]
        release: Option<String>,
        /// Folder checked for sidecar overrides.
        #[clap(long, value_parser = parse_path)]
        folder: Option<PathBuf>,
    },
    /// Reconcile one release's database rows against the audio files in a
    /// folder.
    Reconcile {
        /// Catalog id of the release.
        #[clap(long)]
        release_id: i64,
        /// Folder holding the release's audio files.
        #[clap(long, value_parser = parse_path)]
        folder: PathBuf,
        /// Compute the report without writing anything.
        #[clap(long)]
        dry_run: bool,
    },
    /// Merge a duplicate artist into another.
    MergeArtists {
        /// Artist id to absorb.
        from: i64,
        /// Artist id that survives.
        to: i64,
        /// Perform the merge instead of only reporting it.
        #[clap(long)]
        apply: bool,
    },
    /// Merge a duplicate release into another.
    MergeReleases {
        /// Release id to absorb.
        from: i64,
        /// Release id that survives.
        to: i64,
        /// Perform the merge instead of only reporting it.
        #[clap(long)]
        apply: bool,
    },
}

fn build_providers(settings: &ProviderSettings) -> Result<Vec<Box<dyn SearchProvider>>> {
    let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();

    // Fixed order; it decides which provider wins first-non-null merges.
    if settings.itunes_enabled {
        providers.push(Box::new(ITunesClient::new()?));
    }
    if settings.musicbrainz_enabled {
        providers.push(Box::new(MusicBrainzClient::new()?));
    }
    if let Some(api_key) = &settings.lastfm_api_key {
        providers.push(Box::new(LastFmClient::new(api_key)?));
    }
    if let (Some(id), Some(secret)) = (
        &settings.spotify_client_id,
        &settings.spotify_client_secret,
    ) {
        providers.push(Box::new(SpotifyClient::new(id, secret)?));
    }
    if let Some(token) = &settings.discogs_token {
        providers.push(Box::new(DiscogsClient::new(token)?));
    }
    if settings.wikipedia_enabled {
        providers.push(Box::new(WikipediaClient::new()?));
    }

    Ok(providers)
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        library_root: cli_args.library_root.clone(),
        max_images: cli_args.max_images,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening catalog database at {:?}", config.catalog_db_path());
    let store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);
    let cache = Arc::new(MetaCache::new());
    let collector = Arc::new(ImageCollector::new(config.max_images));

    match cli_args.command {
        Command::Resolve {
            artist,
            release,
            folder,
        } => {
            let aggregator = Arc::new(ProviderAggregator::new(build_providers(
                &config.providers,
            )?));
            info!("{} providers configured", aggregator.provider_count());

            let artist_resolver = ArtistResolver::new(
                store.clone(),
                cache.clone(),
                aggregator.clone(),
                collector.clone(),
            );
            let outcome = artist_resolver.resolve(&artist, folder.as_deref())?;
            println!(
                "Artist '{}' -> id {} ({}{})",
                outcome.entity.name,
                outcome.entity.id,
                if outcome.created { "created" } else { "existing" },
                if outcome.found { "" } else { ", no metadata found" },
            );
            for error in &outcome.errors {
                println!("  provider error: {}", error);
            }

            if let Some(title) = release {
                let label_resolver = Arc::new(LabelResolver::new(
                    store.clone(),
                    cache.clone(),
                    aggregator.clone(),
                    collector.clone(),
                ));
                let release_resolver = ReleaseResolver::new(store, cache, aggregator, collector)
                    .with_label_resolver(label_resolver);
                let release_outcome =
                    release_resolver.resolve(&outcome.entity, &title, folder.as_deref())?;
                println!(
                    "Release '{}' -> id {} ({})",
                    release_outcome.entity.title,
                    release_outcome.entity.id,
                    if release_outcome.created {
                        "created"
                    } else {
                        "existing"
                    },
                );
                for error in &release_outcome.errors {
                    println!("  provider error: {}", error);
                }
            }
        }
        Command::Reconcile {
            release_id,
            folder,
            dry_run,
        } => {
            if !folder.is_dir() {
                bail!("Folder does not exist: {:?}", folder);
            }
            let aggregator = Arc::new(ProviderAggregator::new(build_providers(
                &config.providers,
            )?));
            let artist_resolver = Arc::new(ArtistResolver::new(
                store.clone(),
                cache,
                aggregator,
                collector,
            ));
            let reconciler =
                FolderReconciler::new(store, Arc::new(LoftyTagReader), artist_resolver);

            let report = reconciler.reconcile(release_id, &folder, dry_run)?;
            println!(
                "Release {}: {} files, {} new, {} updated, {} unchanged, {} missing",
                report.release_id,
                report.files_seen,
                report.tracks_discovered,
                report.tracks_updated,
                report.tracks_unchanged,
                report.tracks_missing,
            );
            println!(
                "Status: {:?}, library: {:?}{}",
                report.status,
                report.library_status,
                if dry_run { " (dry run)" } else { "" },
            );
            for error in &report.errors {
                println!("  error: {}", error);
            }
        }
        Command::MergeArtists { from, to, apply } => {
            let merger = EntityMerger::new(store, cache);
            let report = merger.merge_artists(from, to, apply)?;
            print_merge_report(&report);
        }
        Command::MergeReleases { from, to, apply } => {
            let merger = EntityMerger::new(store, cache);
            let report = merger.merge_releases(from, to, apply)?;
            print_merge_report(&report);
        }
    }

    Ok(())
}

fn print_merge_report(report: &roadie::merge::MergeReport) {
    println!(
        "Merge {} -> {}{}",
        report.from_id,
        report.to_id,
        if report.applied {
            ""
        } else {
            " (not applied, pass --apply to execute)"
        },
    );
    println!(
        "  fields filled: {}, releases repointed: {}, releases merged: {}",
        report.fields_filled, report.releases_repointed, report.releases_merged,
    );
    println!(
        "  tracks moved: {}, tracks merged: {}, files adopted: {}",
        report.tracks_moved, report.tracks_merged, report.files_adopted,
    );
    println!(
        "  track artists: {}, genres: {}, images: {}, label links: {}",
        report.track_artists_repointed,
        report.genres_repointed,
        report.images_repointed,
        report.release_labels_repointed,
    );
}
