//! SQLite schema for the catalog database.
//!
//! Surrogate integer rowids are the primary keys; stable external UUIDs are
//! carried in a unique `roadie_id` column. Delimited list columns (alternate
//! names, tags, urls) hold pipe-joined values, split back into `Vec<String>`
//! by the store.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

// =============================================================================
// Core Tables
// =============================================================================

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("roadie_id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("sort_name", &SqlType::Text, non_null = true),
        sqlite_column!("alternate_names", &SqlType::Text), // pipe-delimited
        sqlite_column!("real_name", &SqlType::Text),
        sqlite_column!("artist_type", &SqlType::Text), // PERSON/GROUP/...
        sqlite_column!("begin_date", &SqlType::Text),
        sqlite_column!("end_date", &SqlType::Text),
        sqlite_column!("profile", &SqlType::Text),
        sqlite_column!("thumbnail_url", &SqlType::Text),
        sqlite_column!("musicbrainz_id", &SqlType::Text),
        sqlite_column!("itunes_id", &SqlType::Text),
        sqlite_column!("amg_id", &SqlType::Text),
        sqlite_column!("spotify_id", &SqlType::Text),
        sqlite_column!("discogs_id", &SqlType::Text),
        sqlite_column!("isni", &SqlType::Text), // pipe-delimited
        sqlite_column!("tags", &SqlType::Text), // pipe-delimited
        sqlite_column!("urls", &SqlType::Text), // pipe-delimited
    ],
    indices: &[
        ("idx_artists_name", "name"),
        ("idx_artists_sort_name", "sort_name"),
    ],
    unique_constraints: &[&["roadie_id"]],
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const RELEASES_TABLE: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("roadie_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("alternate_names", &SqlType::Text), // pipe-delimited
        sqlite_column!("release_date", &SqlType::Text),
        sqlite_column!("track_count", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("media_count", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("release_type", &SqlType::Text),
        sqlite_column!("thumbnail_url", &SqlType::Text),
        sqlite_column!("musicbrainz_id", &SqlType::Text),
        sqlite_column!("itunes_id", &SqlType::Text),
        sqlite_column!("amg_id", &SqlType::Text),
        sqlite_column!("spotify_id", &SqlType::Text),
        sqlite_column!("discogs_id", &SqlType::Text),
        sqlite_column!("tags", &SqlType::Text), // pipe-delimited
        sqlite_column!("urls", &SqlType::Text), // pipe-delimited
        sqlite_column!("status", &SqlType::Text, non_null = true, default_value = Some("'NEW'")),
        sqlite_column!(
            "library_status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'INCOMPLETE'")
        ),
    ],
    indices: &[
        ("idx_releases_artist", "artist_id"),
        ("idx_releases_title", "title"),
    ],
    unique_constraints: &[&["roadie_id"]],
};

const RELEASE_FK: ForeignKey = ForeignKey {
    foreign_table: "releases",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const RELEASE_MEDIA_TABLE: Table = Table {
    name: "release_media",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "release_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&RELEASE_FK)
        ),
        sqlite_column!("media_number", &SqlType::Integer, non_null = true),
        sqlite_column!("track_count", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("status", &SqlType::Text, non_null = true, default_value = Some("'OK'")),
    ],
    indices: &[("idx_release_media_release", "release_id")],
    unique_constraints: &[&["release_id", "media_number"]],
};

const RELEASE_MEDIA_FK: ForeignKey = ForeignKey {
    foreign_table: "release_media",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("roadie_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "release_media_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&RELEASE_MEDIA_FK)
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("track_number", &SqlType::Integer, non_null = true),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("file_path", &SqlType::Text),
        sqlite_column!("file_name", &SqlType::Text),
        sqlite_column!("hash", &SqlType::Text),
        sqlite_column!("status", &SqlType::Text, non_null = true, default_value = Some("'NEW'")),
        sqlite_column!("artist_id", &SqlType::Integer), // track-level artist, nullable
        sqlite_column!("part_titles", &SqlType::Text),  // pipe-delimited
        sqlite_column!("musicbrainz_id", &SqlType::Text),
        sqlite_column!("isrc", &SqlType::Text),
        sqlite_column!("amg_id", &SqlType::Text),
        sqlite_column!("spotify_id", &SqlType::Text),
    ],
    indices: &[
        ("idx_tracks_media", "release_media_id"),
        ("idx_tracks_artist", "artist_id"),
    ],
    unique_constraints: &[&["roadie_id"], &["release_media_id", "track_number"]],
};

const LABELS_TABLE: Table = Table {
    name: "labels",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("roadie_id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("sort_name", &SqlType::Text, non_null = true),
        sqlite_column!("alternate_names", &SqlType::Text), // pipe-delimited
        sqlite_column!("musicbrainz_id", &SqlType::Text),
        sqlite_column!("discogs_id", &SqlType::Text),
        sqlite_column!("thumbnail_url", &SqlType::Text),
    ],
    indices: &[("idx_labels_name", "name")],
    unique_constraints: &[&["roadie_id"]],
};

const LABEL_FK: ForeignKey = ForeignKey {
    foreign_table: "labels",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Junction Tables
// =============================================================================

const RELEASE_LABELS_TABLE: Table = Table {
    name: "release_labels",
    columns: &[
        sqlite_column!(
            "release_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&RELEASE_FK)
        ),
        sqlite_column!(
            "label_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&LABEL_FK)
        ),
        sqlite_column!("catalog_number", &SqlType::Text),
        sqlite_column!("begin_date", &SqlType::Text),
        sqlite_column!("end_date", &SqlType::Text),
    ],
    indices: &[
        ("idx_release_labels_release", "release_id"),
        ("idx_release_labels_label", "label_id"),
    ],
    unique_constraints: &[&["release_id", "label_id"]],
};

const GENRES_TABLE: Table = Table {
    name: "genres",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("normalized_name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["normalized_name"]],
};

const ARTIST_GENRES_TABLE: Table = Table {
    name: "artist_genres",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("genre_id", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_artist_genres_artist", "artist_id")],
    unique_constraints: &[&["artist_id", "genre_id"]],
};

const RELEASE_GENRES_TABLE: Table = Table {
    name: "release_genres",
    columns: &[
        sqlite_column!(
            "release_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&RELEASE_FK)
        ),
        sqlite_column!("genre_id", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_release_genres_release", "release_id")],
    unique_constraints: &[&["release_id", "genre_id"]],
};

const IMAGES_TABLE: Table = Table {
    name: "images",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("url", &SqlType::Text, non_null = true),
        sqlite_column!("signature", &SqlType::Text, non_null = true),
        sqlite_column!("bytes", &SqlType::Blob, non_null = true),
        sqlite_column!("artist_id", &SqlType::Integer),
        sqlite_column!("release_id", &SqlType::Integer),
        sqlite_column!("label_id", &SqlType::Integer),
        sqlite_column!("track_id", &SqlType::Integer),
        sqlite_column!("status", &SqlType::Text, non_null = true, default_value = Some("'NEW'")),
    ],
    indices: &[
        ("idx_images_artist", "artist_id"),
        ("idx_images_release", "release_id"),
        ("idx_images_label", "label_id"),
    ],
    unique_constraints: &[],
};

/// All schema versions, oldest first. Index = version number.
pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTISTS_TABLE,
        RELEASES_TABLE,
        RELEASE_MEDIA_TABLE,
        TRACKS_TABLE,
        LABELS_TABLE,
        RELEASE_LABELS_TABLE,
        GENRES_TABLE,
        ARTIST_GENRES_TABLE,
        RELEASE_GENRES_TABLE,
        IMAGES_TABLE,
    ],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &CATALOG_VERSIONED_SCHEMAS[CATALOG_VERSIONED_SCHEMAS.len() - 1];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_track_number_unique_within_medium() {
        let conn = Connection::open_in_memory().unwrap();
        CATALOG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO artists (roadie_id, name, sort_name) VALUES ('a1', 'X', 'X')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO releases (roadie_id, artist_id, title) VALUES ('r1', 1, 'Y')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO release_media (release_id, media_number) VALUES (1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tracks (roadie_id, release_media_id, title, track_number) VALUES ('t1', 1, 'One', 1)",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO tracks (roadie_id, release_media_id, title, track_number) VALUES ('t2', 1, 'Two', 1)",
            [],
        );
        assert!(duplicate.is_err());
    }
}
