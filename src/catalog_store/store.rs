//! SQLite-backed catalog store implementation.
//!
//! One write connection behind a mutex; WAL journal mode. Delimited list
//! columns are joined/split here and nowhere else.

use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogStore;
use crate::normalize::{normalize, SearchKey};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const LIST_DELIMITER: char = '|';

fn join_list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(
            values
                .iter()
                .map(|v| v.replace(LIST_DELIMITER, "/"))
                .collect::<Vec<_>>()
                .join(&LIST_DELIMITER.to_string()),
        )
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    match value {
        Some(joined) if !joined.is_empty() => joined
            .split(LIST_DELIMITER)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = CATALOG_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &CATALOG_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating catalog db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        latest_schema.validate(conn)?;
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in CATALOG_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating catalog db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", (BASE_DB_VERSION + current_version) as i64)?;
    tx.commit()?;
    Ok(())
}

/// SQLite-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .context("Failed to open catalog database")?;

        migrate_if_needed(&mut conn)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let artist_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap_or(0);
        let release_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM releases", [], |r| r.get(0))
            .unwrap_or(0);

        info!(
            "Opened catalog: {} artists, {} releases",
            artist_count, release_count
        );

        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate_if_needed(&mut conn)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("catalog store mutex poisoned")
    }

    // =========================================================================
    // Row parsers
    // =========================================================================

    fn parse_artist_row(row: &rusqlite::Row) -> rusqlite::Result<Artist> {
        Ok(Artist {
            id: row.get(0)?,
            roadie_id: row.get(1)?,
            name: row.get(2)?,
            sort_name: row.get(3)?,
            alternate_names: split_list(row.get(4)?),
            real_name: row.get(5)?,
            artist_type: row
                .get::<_, Option<String>>(6)?
                .map(|s| ArtistType::from_db_str(&s)),
            begin_date: row.get(7)?,
            end_date: row.get(8)?,
            profile: row.get(9)?,
            thumbnail_url: row.get(10)?,
            musicbrainz_id: row.get(11)?,
            itunes_id: row.get(12)?,
            amg_id: row.get(13)?,
            spotify_id: row.get(14)?,
            discogs_id: row.get(15)?,
            isni: split_list(row.get(16)?),
            tags: split_list(row.get(17)?),
            urls: split_list(row.get(18)?),
        })
    }

    fn parse_release_row(row: &rusqlite::Row) -> rusqlite::Result<Release> {
        Ok(Release {
            id: row.get(0)?,
            roadie_id: row.get(1)?,
            artist_id: row.get(2)?,
            title: row.get(3)?,
            alternate_names: split_list(row.get(4)?),
            release_date: row.get(5)?,
            track_count: row.get(6)?,
            media_count: row.get(7)?,
            release_type: row
                .get::<_, Option<String>>(8)?
                .map(|s| ReleaseType::from_db_str(&s)),
            thumbnail_url: row.get(9)?,
            musicbrainz_id: row.get(10)?,
            itunes_id: row.get(11)?,
            amg_id: row.get(12)?,
            spotify_id: row.get(13)?,
            discogs_id: row.get(14)?,
            tags: split_list(row.get(15)?),
            urls: split_list(row.get(16)?),
            status: ReleaseStatus::from_db_str(&row.get::<_, String>(17)?),
            library_status: LibraryStatus::from_db_str(&row.get::<_, String>(18)?),
        })
    }

    fn parse_media_row(row: &rusqlite::Row) -> rusqlite::Result<ReleaseMedia> {
        Ok(ReleaseMedia {
            id: row.get(0)?,
            release_id: row.get(1)?,
            media_number: row.get(2)?,
            track_count: row.get(3)?,
            status: MediaStatus::from_db_str(&row.get::<_, String>(4)?),
        })
    }

    fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<Track> {
        Ok(Track {
            id: row.get(0)?,
            roadie_id: row.get(1)?,
            release_media_id: row.get(2)?,
            title: row.get(3)?,
            track_number: row.get(4)?,
            duration_ms: row.get(5)?,
            file_path: row.get(6)?,
            file_name: row.get(7)?,
            hash: row.get(8)?,
            status: TrackStatus::from_db_str(&row.get::<_, String>(9)?),
            artist_id: row.get(10)?,
            part_titles: split_list(row.get(11)?),
            musicbrainz_id: row.get(12)?,
            isrc: row.get(13)?,
            amg_id: row.get(14)?,
            spotify_id: row.get(15)?,
        })
    }

    fn parse_label_row(row: &rusqlite::Row) -> rusqlite::Result<Label> {
        Ok(Label {
            id: row.get(0)?,
            roadie_id: row.get(1)?,
            name: row.get(2)?,
            sort_name: row.get(3)?,
            alternate_names: split_list(row.get(4)?),
            musicbrainz_id: row.get(5)?,
            discogs_id: row.get(6)?,
            thumbnail_url: row.get(7)?,
        })
    }

    // =========================================================================
    // Internal write helpers (operate within a caller-held connection)
    // =========================================================================

    fn insert_artist_row(conn: &Connection, artist: &Artist) -> Result<i64> {
        conn.execute(
            "INSERT INTO artists (roadie_id, name, sort_name, alternate_names, real_name, \
             artist_type, begin_date, end_date, profile, thumbnail_url, musicbrainz_id, \
             itunes_id, amg_id, spotify_id, discogs_id, isni, tags, urls) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                artist.roadie_id,
                artist.name,
                artist.sort_name,
                join_list(&artist.alternate_names),
                artist.real_name,
                artist.artist_type.map(|t| t.to_db_str()),
                artist.begin_date,
                artist.end_date,
                artist.profile,
                artist.thumbnail_url,
                artist.musicbrainz_id,
                artist.itunes_id,
                artist.amg_id,
                artist.spotify_id,
                artist.discogs_id,
                join_list(&artist.isni),
                join_list(&artist.tags),
                join_list(&artist.urls),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_release_row(conn: &Connection, release: &Release) -> Result<i64> {
        conn.execute(
            "INSERT INTO releases (roadie_id, artist_id, title, alternate_names, release_date, \
             track_count, media_count, release_type, thumbnail_url, musicbrainz_id, itunes_id, \
             amg_id, spotify_id, discogs_id, tags, urls, status, library_status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                release.roadie_id,
                release.artist_id,
                release.title,
                join_list(&release.alternate_names),
                release.release_date,
                release.track_count,
                release.media_count,
                release.release_type.map(|t| t.to_db_str()),
                release.thumbnail_url,
                release.musicbrainz_id,
                release.itunes_id,
                release.amg_id,
                release.spotify_id,
                release.discogs_id,
                join_list(&release.tags),
                join_list(&release.urls),
                release.status.to_db_str(),
                release.library_status.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_label_row(conn: &Connection, label: &Label) -> Result<i64> {
        conn.execute(
            "INSERT INTO labels (roadie_id, name, sort_name, alternate_names, musicbrainz_id, \
             discogs_id, thumbnail_url) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                label.roadie_id,
                label.name,
                label.sort_name,
                join_list(&label.alternate_names),
                label.musicbrainz_id,
                label.discogs_id,
                label.thumbnail_url,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn upsert_genre_row(conn: &Connection, name: &str) -> Result<i64> {
        let normalized = normalize(name).display;
        if let Some(id) = conn
            .query_row(
                "SELECT id FROM genres WHERE normalized_name = ?1",
                params![normalized],
                |r| r.get::<_, i64>(0),
            )
            .optional()?
        {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO genres (name, normalized_name) VALUES (?1, ?2)",
            params![name.trim(), normalized],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_image_row(conn: &Connection, image: &Image) -> Result<i64> {
        conn.execute(
            "INSERT INTO images (url, signature, bytes, artist_id, release_id, label_id, \
             track_id, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                image.url,
                image.signature,
                image.bytes,
                image.artist_id,
                image.release_id,
                image.label_id,
                image.track_id,
                image.status.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

const ARTIST_COLUMNS: &str = "id, roadie_id, name, sort_name, alternate_names, real_name, \
     artist_type, begin_date, end_date, profile, thumbnail_url, musicbrainz_id, itunes_id, \
     amg_id, spotify_id, discogs_id, isni, tags, urls";

const RELEASE_COLUMNS: &str = "id, roadie_id, artist_id, title, alternate_names, release_date, \
     track_count, media_count, release_type, thumbnail_url, musicbrainz_id, itunes_id, amg_id, \
     spotify_id, discogs_id, tags, urls, status, library_status";

const TRACK_COLUMNS: &str = "id, roadie_id, release_media_id, title, track_number, duration_ms, \
     file_path, file_name, hash, status, artist_id, part_titles, musicbrainz_id, isrc, amg_id, \
     spotify_id";

const LABEL_COLUMNS: &str = "id, roadie_id, name, sort_name, alternate_names, musicbrainz_id, \
     discogs_id, thumbnail_url";

impl CatalogStore for SqliteCatalogStore {
    // =========================================================================
    // Artists
    // =========================================================================

    fn create_artist(&self, artist: &Artist, genres: &[String], images: &[Image]) -> Result<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let artist_id = Self::insert_artist_row(&tx, artist)?;
        for genre in genres {
            let genre_id = Self::upsert_genre_row(&tx, genre)?;
            tx.execute(
                "INSERT OR IGNORE INTO artist_genres (artist_id, genre_id) VALUES (?1, ?2)",
                params![artist_id, genre_id],
            )?;
        }
        for image in images {
            let mut owned = image.clone();
            owned.artist_id = Some(artist_id);
            Self::insert_image_row(&tx, &owned)?;
        }
        tx.commit()?;
        Ok(artist_id)
    }

    fn get_artist(&self, id: i64) -> Result<Option<Artist>> {
        let conn = self.lock();
        let artist = conn
            .query_row(
                &format!("SELECT {} FROM artists WHERE id = ?1", ARTIST_COLUMNS),
                params![id],
                Self::parse_artist_row,
            )
            .optional()?;
        Ok(artist)
    }

    fn find_artist_by_name(&self, key: &SearchKey) -> Result<Option<Artist>> {
        if key.is_empty() {
            return Ok(None);
        }
        let conn = self.lock();
        let artist = conn
            .query_row(
                &format!(
                    "SELECT {} FROM artists WHERE lower(name) = ?1 OR lower(sort_name) = ?1 \
                     OR lower(name) = ?2 \
                     OR '|' || lower(ifnull(alternate_names, '')) || '|' LIKE '%|' || ?1 || '|%' \
                     OR '|' || lower(ifnull(alternate_names, '')) || '|' LIKE '%|' || ?2 || '|%' \
                     ORDER BY id LIMIT 1",
                    ARTIST_COLUMNS
                ),
                params![key.display, key.alphanumeric],
                Self::parse_artist_row,
            )
            .optional()?;
        Ok(artist)
    }

    fn update_artist(&self, artist: &Artist) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE artists SET name = ?2, sort_name = ?3, alternate_names = ?4, real_name = ?5, \
             artist_type = ?6, begin_date = ?7, end_date = ?8, profile = ?9, thumbnail_url = ?10, \
             musicbrainz_id = ?11, itunes_id = ?12, amg_id = ?13, spotify_id = ?14, \
             discogs_id = ?15, isni = ?16, tags = ?17, urls = ?18 WHERE id = ?1",
            params![
                artist.id,
                artist.name,
                artist.sort_name,
                join_list(&artist.alternate_names),
                artist.real_name,
                artist.artist_type.map(|t| t.to_db_str()),
                artist.begin_date,
                artist.end_date,
                artist.profile,
                artist.thumbnail_url,
                artist.musicbrainz_id,
                artist.itunes_id,
                artist.amg_id,
                artist.spotify_id,
                artist.discogs_id,
                join_list(&artist.isni),
                join_list(&artist.tags),
                join_list(&artist.urls),
            ],
        )?;
        Ok(())
    }

    fn delete_artist(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM artist_genres WHERE artist_id = ?1", params![id])?;
        conn.execute("DELETE FROM images WHERE artist_id = ?1", params![id])?;
        conn.execute("DELETE FROM artists WHERE id = ?1", params![id])?;
        Ok(())
    }

    // =========================================================================
    // Releases
    // =========================================================================

    fn create_release(
        &self,
        release: &Release,
        genres: &[String],
        images: &[Image],
    ) -> Result<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let release_id = Self::insert_release_row(&tx, release)?;
        for genre in genres {
            let genre_id = Self::upsert_genre_row(&tx, genre)?;
            tx.execute(
                "INSERT OR IGNORE INTO release_genres (release_id, genre_id) VALUES (?1, ?2)",
                params![release_id, genre_id],
            )?;
        }
        for image in images {
            let mut owned = image.clone();
            owned.release_id = Some(release_id);
            Self::insert_image_row(&tx, &owned)?;
        }
        tx.commit()?;
        Ok(release_id)
    }

    fn get_release(&self, id: i64) -> Result<Option<Release>> {
        let conn = self.lock();
        let release = conn
            .query_row(
                &format!("SELECT {} FROM releases WHERE id = ?1", RELEASE_COLUMNS),
                params![id],
                Self::parse_release_row,
            )
            .optional()?;
        Ok(release)
    }

    fn find_release_by_title(&self, artist_id: i64, key: &SearchKey) -> Result<Option<Release>> {
        if key.is_empty() {
            return Ok(None);
        }
        let conn = self.lock();
        let release = conn
            .query_row(
                &format!(
                    "SELECT {} FROM releases WHERE artist_id = ?1 AND (lower(title) = ?2 \
                     OR lower(title) = ?3 \
                     OR '|' || lower(ifnull(alternate_names, '')) || '|' LIKE '%|' || ?2 || '|%' \
                     OR '|' || lower(ifnull(alternate_names, '')) || '|' LIKE '%|' || ?3 || '|%') \
                     ORDER BY id LIMIT 1",
                    RELEASE_COLUMNS
                ),
                params![artist_id, key.display, key.alphanumeric],
                Self::parse_release_row,
            )
            .optional()?;
        Ok(release)
    }

    fn update_release(&self, release: &Release) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE releases SET title = ?2, alternate_names = ?3, release_date = ?4, \
             track_count = ?5, media_count = ?6, release_type = ?7, thumbnail_url = ?8, \
             musicbrainz_id = ?9, itunes_id = ?10, amg_id = ?11, spotify_id = ?12, \
             discogs_id = ?13, tags = ?14, urls = ?15, status = ?16, library_status = ?17 \
             WHERE id = ?1",
            params![
                release.id,
                release.title,
                join_list(&release.alternate_names),
                release.release_date,
                release.track_count,
                release.media_count,
                release.release_type.map(|t| t.to_db_str()),
                release.thumbnail_url,
                release.musicbrainz_id,
                release.itunes_id,
                release.amg_id,
                release.spotify_id,
                release.discogs_id,
                join_list(&release.tags),
                join_list(&release.urls),
                release.status.to_db_str(),
                release.library_status.to_db_str(),
            ],
        )?;
        Ok(())
    }

    fn delete_release(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM release_genres WHERE release_id = ?1",
            params![id],
        )?;
        conn.execute(
            "DELETE FROM release_labels WHERE release_id = ?1",
            params![id],
        )?;
        conn.execute("DELETE FROM images WHERE release_id = ?1", params![id])?;
        conn.execute("DELETE FROM releases WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_releases_for_artist(&self, artist_id: i64) -> Result<Vec<Release>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM releases WHERE artist_id = ?1 ORDER BY id",
            RELEASE_COLUMNS
        ))?;
        let releases = stmt
            .query_map(params![artist_id], Self::parse_release_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    fn reassign_release_artist(&self, release_id: i64, artist_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE releases SET artist_id = ?2 WHERE id = ?1",
            params![release_id, artist_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Release media
    // =========================================================================

    fn insert_release_media(&self, media: &ReleaseMedia) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO release_media (release_id, media_number, track_count, status) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                media.release_id,
                media.media_number,
                media.track_count,
                media.status.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_release_media(
        &self,
        release_id: i64,
        media_number: i32,
    ) -> Result<Option<ReleaseMedia>> {
        let conn = self.lock();
        let media = conn
            .query_row(
                "SELECT id, release_id, media_number, track_count, status FROM release_media \
                 WHERE release_id = ?1 AND media_number = ?2",
                params![release_id, media_number],
                Self::parse_media_row,
            )
            .optional()?;
        Ok(media)
    }

    fn list_release_media(&self, release_id: i64) -> Result<Vec<ReleaseMedia>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, release_id, media_number, track_count, status FROM release_media \
             WHERE release_id = ?1 ORDER BY media_number",
        )?;
        let media = stmt
            .query_map(params![release_id], Self::parse_media_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(media)
    }

    fn update_release_media(&self, media: &ReleaseMedia) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE release_media SET track_count = ?2, status = ?3 WHERE id = ?1",
            params![media.id, media.track_count, media.status.to_db_str()],
        )?;
        Ok(())
    }

    fn delete_release_media(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM release_media WHERE id = ?1", params![id])?;
        Ok(())
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    fn insert_track(&self, track: &Track) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tracks (roadie_id, release_media_id, title, track_number, duration_ms, \
             file_path, file_name, hash, status, artist_id, part_titles, musicbrainz_id, isrc, \
             amg_id, spotify_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                track.roadie_id,
                track.release_media_id,
                track.title,
                track.track_number,
                track.duration_ms,
                track.file_path,
                track.file_name,
                track.hash,
                track.status.to_db_str(),
                track.artist_id,
                join_list(&track.part_titles),
                track.musicbrainz_id,
                track.isrc,
                track.amg_id,
                track.spotify_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_track(&self, id: i64) -> Result<Option<Track>> {
        let conn = self.lock();
        let track = conn
            .query_row(
                &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
                params![id],
                Self::parse_track_row,
            )
            .optional()?;
        Ok(track)
    }

    fn find_track(&self, release_media_id: i64, track_number: i32) -> Result<Option<Track>> {
        let conn = self.lock();
        let track = conn
            .query_row(
                &format!(
                    "SELECT {} FROM tracks WHERE release_media_id = ?1 AND track_number = ?2",
                    TRACK_COLUMNS
                ),
                params![release_media_id, track_number],
                Self::parse_track_row,
            )
            .optional()?;
        Ok(track)
    }

    fn update_track(&self, track: &Track) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE tracks SET title = ?2, track_number = ?3, duration_ms = ?4, file_path = ?5, \
             file_name = ?6, hash = ?7, status = ?8, artist_id = ?9, part_titles = ?10, \
             musicbrainz_id = ?11, isrc = ?12, amg_id = ?13, spotify_id = ?14 WHERE id = ?1",
            params![
                track.id,
                track.title,
                track.track_number,
                track.duration_ms,
                track.file_path,
                track.file_name,
                track.hash,
                track.status.to_db_str(),
                track.artist_id,
                join_list(&track.part_titles),
                track.musicbrainz_id,
                track.isrc,
                track.amg_id,
                track.spotify_id,
            ],
        )?;
        Ok(())
    }

    fn delete_track(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM images WHERE track_id = ?1", params![id])?;
        conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_tracks_for_release(&self, release_id: i64) -> Result<Vec<Track>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM tracks t WHERE t.release_media_id IN \
             (SELECT id FROM release_media WHERE release_id = ?1) \
             ORDER BY t.release_media_id, t.track_number",
            "t.id, t.roadie_id, t.release_media_id, t.title, t.track_number, t.duration_ms, \
             t.file_path, t.file_name, t.hash, t.status, t.artist_id, t.part_titles, \
             t.musicbrainz_id, t.isrc, t.amg_id, t.spotify_id"
        ))?;
        let tracks = stmt
            .query_map(params![release_id], Self::parse_track_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn list_tracks_for_media(&self, release_media_id: i64) -> Result<Vec<Track>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM tracks WHERE release_media_id = ?1 ORDER BY track_number",
            TRACK_COLUMNS
        ))?;
        let tracks = stmt
            .query_map(params![release_media_id], Self::parse_track_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn count_tracks_with_artist(&self, artist_id: i64) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE artist_id = ?1",
            params![artist_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    fn repoint_track_artists(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE tracks SET artist_id = ?2 WHERE artist_id = ?1",
            params![from_artist_id, to_artist_id],
        )?;
        Ok(affected)
    }

    fn reassign_track_media(&self, track_id: i64, release_media_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE tracks SET release_media_id = ?2 WHERE id = ?1",
            params![track_id, release_media_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Labels
    // =========================================================================

    fn create_label(&self, label: &Label, images: &[Image]) -> Result<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let label_id = Self::insert_label_row(&tx, label)?;
        for image in images {
            let mut owned = image.clone();
            owned.label_id = Some(label_id);
            Self::insert_image_row(&tx, &owned)?;
        }
        tx.commit()?;
        Ok(label_id)
    }

    fn get_label(&self, id: i64) -> Result<Option<Label>> {
        let conn = self.lock();
        let label = conn
            .query_row(
                &format!("SELECT {} FROM labels WHERE id = ?1", LABEL_COLUMNS),
                params![id],
                Self::parse_label_row,
            )
            .optional()?;
        Ok(label)
    }

    fn find_label_by_name(&self, key: &SearchKey) -> Result<Option<Label>> {
        if key.is_empty() {
            return Ok(None);
        }
        let conn = self.lock();
        let label = conn
            .query_row(
                &format!(
                    "SELECT {} FROM labels WHERE lower(name) = ?1 OR lower(sort_name) = ?1 \
                     OR lower(name) = ?2 \
                     OR '|' || lower(ifnull(alternate_names, '')) || '|' LIKE '%|' || ?1 || '|%' \
                     OR '|' || lower(ifnull(alternate_names, '')) || '|' LIKE '%|' || ?2 || '|%' \
                     ORDER BY id LIMIT 1",
                    LABEL_COLUMNS
                ),
                params![key.display, key.alphanumeric],
                Self::parse_label_row,
            )
            .optional()?;
        Ok(label)
    }

    fn update_label(&self, label: &Label) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE labels SET name = ?2, sort_name = ?3, alternate_names = ?4, \
             musicbrainz_id = ?5, discogs_id = ?6, thumbnail_url = ?7 WHERE id = ?1",
            params![
                label.id,
                label.name,
                label.sort_name,
                join_list(&label.alternate_names),
                label.musicbrainz_id,
                label.discogs_id,
                label.thumbnail_url,
            ],
        )?;
        Ok(())
    }

    fn delete_label(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM release_labels WHERE label_id = ?1", params![id])?;
        conn.execute("DELETE FROM images WHERE label_id = ?1", params![id])?;
        conn.execute("DELETE FROM labels WHERE id = ?1", params![id])?;
        Ok(())
    }

    // =========================================================================
    // Release <-> Label associations
    // =========================================================================

    fn associate_release_label(&self, release_label: &ReleaseLabel) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO release_labels (release_id, label_id, catalog_number, \
             begin_date, end_date) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                release_label.release_id,
                release_label.label_id,
                release_label.catalog_number,
                release_label.begin_date,
                release_label.end_date,
            ],
        )?;
        Ok(())
    }

    fn list_release_labels(&self, release_id: i64) -> Result<Vec<ReleaseLabel>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT release_id, label_id, catalog_number, begin_date, end_date \
             FROM release_labels WHERE release_id = ?1 ORDER BY label_id",
        )?;
        let labels = stmt
            .query_map(params![release_id], |row| {
                Ok(ReleaseLabel {
                    release_id: row.get(0)?,
                    label_id: row.get(1)?,
                    catalog_number: row.get(2)?,
                    begin_date: row.get(3)?,
                    end_date: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn count_release_labels_for_label(&self, label_id: i64) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM release_labels WHERE label_id = ?1",
            params![label_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    fn repoint_release_labels(&self, from_label_id: i64, to_label_id: i64) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        // Drop pairs that would collide with an existing association.
        tx.execute(
            "DELETE FROM release_labels WHERE label_id = ?1 AND release_id IN \
             (SELECT release_id FROM release_labels WHERE label_id = ?2)",
            params![from_label_id, to_label_id],
        )?;
        let affected = tx.execute(
            "UPDATE release_labels SET label_id = ?2 WHERE label_id = ?1",
            params![from_label_id, to_label_id],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    // =========================================================================
    // Genres
    // =========================================================================

    fn upsert_genre(&self, name: &str) -> Result<i64> {
        let conn = self.lock();
        Self::upsert_genre_row(&conn, name)
    }

    fn associate_artist_genre(&self, artist_id: i64, genre_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO artist_genres (artist_id, genre_id) VALUES (?1, ?2)",
            params![artist_id, genre_id],
        )?;
        Ok(())
    }

    fn associate_release_genre(&self, release_id: i64, genre_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO release_genres (release_id, genre_id) VALUES (?1, ?2)",
            params![release_id, genre_id],
        )?;
        Ok(())
    }

    fn list_artist_genres(&self, artist_id: i64) -> Result<Vec<Genre>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT g.id, g.name, g.normalized_name FROM genres g \
             JOIN artist_genres ag ON ag.genre_id = g.id WHERE ag.artist_id = ?1 ORDER BY g.name",
        )?;
        let genres = stmt
            .query_map(params![artist_id], |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    normalized_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(genres)
    }

    fn list_release_genres(&self, release_id: i64) -> Result<Vec<Genre>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT g.id, g.name, g.normalized_name FROM genres g \
             JOIN release_genres rg ON rg.genre_id = g.id WHERE rg.release_id = ?1 \
             ORDER BY g.name",
        )?;
        let genres = stmt
            .query_map(params![release_id], |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    normalized_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(genres)
    }

    fn repoint_artist_genres(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM artist_genres WHERE artist_id = ?1 AND genre_id IN \
             (SELECT genre_id FROM artist_genres WHERE artist_id = ?2)",
            params![from_artist_id, to_artist_id],
        )?;
        let affected = tx.execute(
            "UPDATE artist_genres SET artist_id = ?2 WHERE artist_id = ?1",
            params![from_artist_id, to_artist_id],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    fn repoint_release_genres(&self, from_release_id: i64, to_release_id: i64) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM release_genres WHERE release_id = ?1 AND genre_id IN \
             (SELECT genre_id FROM release_genres WHERE release_id = ?2)",
            params![from_release_id, to_release_id],
        )?;
        let affected = tx.execute(
            "UPDATE release_genres SET release_id = ?2 WHERE release_id = ?1",
            params![from_release_id, to_release_id],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    // =========================================================================
    // Images
    // =========================================================================

    fn insert_image(&self, image: &Image) -> Result<i64> {
        let conn = self.lock();
        Self::insert_image_row(&conn, image)
    }

    fn count_artist_images(&self, artist_id: i64) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE artist_id = ?1",
            params![artist_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_release_images(&self, release_id: i64) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE release_id = ?1",
            params![release_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_label_images(&self, label_id: i64) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE label_id = ?1",
            params![label_id],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    fn repoint_artist_images(&self, from_artist_id: i64, to_artist_id: i64) -> Result<usize> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE images SET artist_id = ?2 WHERE artist_id = ?1",
            params![from_artist_id, to_artist_id],
        )?;
        Ok(affected)
    }

    fn repoint_release_images(&self, from_release_id: i64, to_release_id: i64) -> Result<usize> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE images SET release_id = ?2 WHERE release_id = ?1",
            params![from_release_id, to_release_id],
        )?;
        Ok(affected)
    }

    fn repoint_label_images(&self, from_label_id: i64, to_label_id: i64) -> Result<usize> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE images SET label_id = ?2 WHERE label_id = ?1",
            params![from_label_id, to_label_id],
        )?;
        Ok(affected)
    }

    // =========================================================================
    // Counts
    // =========================================================================

    fn get_artists_count(&self) -> usize {
        let conn = self.lock();
        conn.query_row("SELECT COUNT(*) FROM artists", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    fn get_releases_count(&self) -> usize {
        let conn = self.lock();
        conn.query_row("SELECT COUNT(*) FROM releases", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    fn get_tracks_count(&self) -> usize {
        let conn = self.lock();
        conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn store() -> SqliteCatalogStore {
        SqliteCatalogStore::open_in_memory().unwrap()
    }

    fn make_artist(name: &str) -> Artist {
        let mut artist = Artist {
            roadie_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            sort_name: name.to_string(),
            ..Default::default()
        };
        artist.close_alternate_names();
        artist
    }

    #[test]
    fn test_create_and_get_artist() {
        let store = store();
        let id = store
            .create_artist(&make_artist("Radiohead"), &["rock".into()], &[])
            .unwrap();
        let fetched = store.get_artist(id).unwrap().unwrap();
        assert_eq!(fetched.name, "Radiohead");
        assert_eq!(store.list_artist_genres(id).unwrap().len(), 1);
    }

    #[test]
    fn test_find_artist_by_alternate_name() {
        let store = store();
        let mut artist = make_artist("Motörhead");
        artist.close_alternate_names();
        store.create_artist(&artist, &[], &[]).unwrap();

        let found = store
            .find_artist_by_name(&normalize("MOTORHEAD"))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Motörhead");
    }

    #[test]
    fn test_find_artist_tie_break_is_lowest_id() {
        let store = store();
        let first = store.create_artist(&make_artist("Dup"), &[], &[]).unwrap();
        let _second = store.create_artist(&make_artist("Dup"), &[], &[]).unwrap();

        let found = store.find_artist_by_name(&normalize("Dup")).unwrap().unwrap();
        assert_eq!(found.id, first);
    }

    #[test]
    fn test_list_roundtrips_through_delimited_column() {
        let store = store();
        let mut artist = make_artist("Tagged");
        artist.tags = vec!["electronic".to_string(), "idm".to_string()];
        artist.urls = vec!["https://example.com".to_string()];
        let id = store.create_artist(&artist, &[], &[]).unwrap();

        let fetched = store.get_artist(id).unwrap().unwrap();
        assert_eq!(fetched.tags, vec!["electronic", "idm"]);
        assert_eq!(fetched.urls, vec!["https://example.com"]);
    }

    #[test]
    fn test_upsert_genre_is_idempotent() {
        let store = store();
        let a = store.upsert_genre("Hip Hop").unwrap();
        let b = store.upsert_genre("hip hop").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_repoint_release_labels_drops_collisions() {
        let store = store();
        let artist = store.create_artist(&make_artist("A"), &[], &[]).unwrap();
        let release = store
            .create_release(
                &Release {
                    roadie_id: Uuid::new_v4().to_string(),
                    artist_id: artist,
                    title: "R".to_string(),
                    ..Default::default()
                },
                &[],
                &[],
            )
            .unwrap();
        let label_a = store
            .create_label(
                &Label {
                    roadie_id: Uuid::new_v4().to_string(),
                    name: "LA".to_string(),
                    sort_name: "LA".to_string(),
                    ..Default::default()
                },
                &[],
            )
            .unwrap();
        let label_b = store
            .create_label(
                &Label {
                    roadie_id: Uuid::new_v4().to_string(),
                    name: "LB".to_string(),
                    sort_name: "LB".to_string(),
                    ..Default::default()
                },
                &[],
            )
            .unwrap();

        // Same release associated with both labels; repointing A onto B must
        // not produce a duplicate pair.
        for label_id in [label_a, label_b] {
            store
                .associate_release_label(&ReleaseLabel {
                    release_id: release,
                    label_id,
                    catalog_number: None,
                    begin_date: None,
                    end_date: None,
                })
                .unwrap();
        }

        store.repoint_release_labels(label_a, label_b).unwrap();
        let remaining = store.list_release_labels(release).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].label_id, label_b);
    }

    #[test]
    fn test_delete_artist_cascades_to_releases() {
        let store = store();
        let artist = store.create_artist(&make_artist("Gone"), &[], &[]).unwrap();
        let release = store
            .create_release(
                &Release {
                    roadie_id: Uuid::new_v4().to_string(),
                    artist_id: artist,
                    title: "Gone Album".to_string(),
                    ..Default::default()
                },
                &[],
                &[],
            )
            .unwrap();

        store.delete_artist(artist).unwrap();
        assert!(store.get_release(release).unwrap().is_none());
    }
}
