//! Audio tag reading behind a trait so reconciliation is testable without
//! real audio files.

use anyhow::{Context, Result};
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use std::path::Path;

/// The tag fields reconciliation cares about. Totals are self-reported by
/// the file and treated as hints, never as ground truth.
#[derive(Debug, Clone, Default)]
pub struct AudioTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub duration_ms: Option<i64>,
}

pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<AudioTags>;
}

/// Production tag reader backed by lofty.
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<AudioTags> {
        let tagged = Probe::open(path)
            .with_context(|| format!("Failed to open {:?}", path))?
            .read()
            .with_context(|| format!("Failed to read tags from {:?}", path))?;

        let duration_ms = Some(tagged.properties().duration().as_millis() as i64);

        let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
        let Some(tag) = tag else {
            return Ok(AudioTags {
                duration_ms,
                ..Default::default()
            });
        };

        Ok(AudioTags {
            title: tag.title().map(|t| t.to_string()),
            artist: tag.artist().map(|a| a.to_string()),
            album_artist: tag
                .get_string(&ItemKey::AlbumArtist)
                .map(|a| a.to_string()),
            album: tag.album().map(|a| a.to_string()),
            track_number: tag.track(),
            track_total: tag.track_total(),
            disc_number: tag.disk(),
            disc_total: tag.disk_total(),
            duration_ms,
        })
    }
}
