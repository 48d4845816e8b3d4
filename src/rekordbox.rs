use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use color_eyre::eyre::{Result, WrapErr};
use rusqlite::{Connection, OpenFlags, params};

use crate::models::{PlaylistKind, PlaylistRow, Track};
use crate::ports::catalog::Catalog;

/// SQLCipher passphrase rekordbox 6 uses for `master.db`.
pub const DEFAULT_DB_KEY: &str = "402fd482c38817c35ffa8ffb8c7d93143b749e7d315df7a81732a1ff43608497";

/// Read-only handle on a rekordbox `master.db`.
pub struct RekordboxDb {
    conn: Connection,
}

/// One `sqlite_master` entry, printed by the `schema` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub kind: String,
    pub name: String,
    pub sql: String,
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-- {}: {}\n{};\n", self.kind, self.name, self.sql)
    }
}

impl RekordboxDb {
    /// Open and decrypt the database at `path`.
    pub fn open(path: &Path, key: &str) -> Result<Self> {
        tracing::debug!("Opening rekordbox database at: {}", path.display());

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .wrap_err_with(|| format!("Failed to open rekordbox database: {}", path.display()))?;

        conn.execute_batch(&format!(
            "PRAGMA key = '{}'; PRAGMA cipher_compatibility = 4;",
            key.replace('\'', "''")
        ))
        .wrap_err("Failed to set database key")?;

        // SQLCipher only notices a wrong key on first read
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .wrap_err_with(|| {
            format!(
                "Failed to read rekordbox database {} (wrong key?)",
                path.display()
            )
        })?;

        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// `~/Library/Pioneer/rekordbox/master.db`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join("Library/Pioneer/rekordbox/master.db"))
    }

    /// Number of live tracks per playlist id.
    pub fn playlist_track_counts(&self) -> Result<HashMap<String, usize>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT sp.PlaylistID, COUNT(*)
                 FROM djmdSongPlaylist sp
                 JOIN djmdContent c ON sp.ContentID = c.ID
                 WHERE sp.rb_local_deleted = 0 AND c.rb_local_deleted = 0
                 GROUP BY sp.PlaylistID",
            )
            .wrap_err("Failed to prepare track count query")?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })
            .wrap_err("Failed to query track counts")?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .wrap_err("Failed to read track count row")?;

        Ok(counts)
    }

    /// Tables, indexes, views and triggers of the database.
    pub fn dump_schema(&self) -> Result<Vec<SchemaObject>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT type, name, sql
                 FROM sqlite_master
                 WHERE type IN ('table', 'index', 'view', 'trigger') AND sql IS NOT NULL
                 ORDER BY type, name",
            )
            .wrap_err("Failed to prepare schema query")?;

        let objects = stmt
            .query_map([], |row| {
                Ok(SchemaObject {
                    kind: row.get(0)?,
                    name: row.get(1)?,
                    sql: row.get(2)?,
                })
            })
            .wrap_err("Failed to query schema")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .wrap_err("Failed to read schema row")?;

        Ok(objects)
    }
}

fn parse_created_at(value: Option<String>) -> Option<NaiveDateTime> {
    // rekordbox writes "2023-04-01 10:00:00.000 +00:00"
    let value = value?;
    NaiveDateTime::parse_from_str(value.get(..19)?, "%Y-%m-%d %H:%M:%S").ok()
}

impl Catalog for RekordboxDb {
    fn playlist_rows(&self) -> Result<Vec<PlaylistRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT p.ID, COALESCE(p.Name, ''), p.ParentID, COALESCE(p.Seq, 0),
                        COALESCE(p.Attribute, 0), p.created_at
                 FROM djmdPlaylist p
                 WHERE p.rb_local_deleted = 0",
            )
            .wrap_err("Failed to prepare playlist query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PlaylistRow {
                    id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    name: row.get(1)?,
                    parent_id: row.get(2)?,
                    sequence: row.get(3)?,
                    kind: PlaylistKind::from_attribute(row.get(4)?),
                    created_at: parse_created_at(row.get(5)?),
                })
            })
            .wrap_err("Failed to query playlists")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .wrap_err("Failed to read playlist row")?;

        Ok(rows)
    }

    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT COALESCE(a.Name, ''), COALESCE(c.Title, '')
                 FROM djmdSongPlaylist sp
                 JOIN djmdContent c ON sp.ContentID = c.ID
                 LEFT JOIN djmdArtist a ON c.ArtistID = a.ID
                 WHERE sp.PlaylistID = ?1 AND sp.rb_local_deleted = 0 AND c.rb_local_deleted = 0
                 ORDER BY sp.TrackNo",
            )
            .wrap_err("Failed to prepare playlist tracks query")?;

        let tracks = stmt
            .query_map(params![playlist_id], |row| {
                Ok(Track {
                    artist: row.get(0)?,
                    title: row.get(1)?,
                })
            })
            .wrap_err_with(|| format!("Failed to query tracks for playlist {}", playlist_id))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .wrap_err("Failed to read track row")?;

        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::hierarchy::build_hierarchy;
    use crate::test_utils::{REKORDBOX_FIXTURE_SCHEMA, test_rekordbox_db};

    #[test]
    fn test_playlist_rows_skip_deleted() {
        let db = test_rekordbox_db();
        let mut rows = db.playlist_rows().unwrap();
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "11", "12", "20"]);
        assert_eq!(rows[0].kind, PlaylistKind::Folder);
        assert_eq!(rows[0].parent_id.as_deref(), Some("root"));
        assert_eq!(rows[1].sequence, 2);
    }

    #[test]
    fn test_created_at_parsing() {
        let db = test_rekordbox_db();
        let rows = db.playlist_rows().unwrap();
        let by_id = |id: &str| rows.iter().find(|r| r.id == id).unwrap().created_at;

        assert_eq!(
            by_id("10").unwrap().to_string(),
            "2023-04-01 10:00:00"
        );
        assert!(by_id("20").is_some());
        assert!(by_id("12").is_none());
    }

    #[test]
    fn test_playlist_tracks_ordered_by_track_number() {
        let db = test_rekordbox_db();
        let tracks = db.playlist_tracks("11").unwrap();

        assert_eq!(
            tracks,
            vec![
                Track {
                    artist: "Charlotte de Witte".into(),
                    title: "Doppler (Original Mix)".into(),
                },
                Track {
                    artist: " Amelie Lens ".into(),
                    title: "Hypnotized".into(),
                },
                Track {
                    artist: "".into(),
                    title: "No Artist Tool".into(),
                },
            ]
        );
    }

    #[test]
    fn test_playlist_tracks_unknown_playlist_is_empty() {
        let db = test_rekordbox_db();
        assert!(db.playlist_tracks("nope").unwrap().is_empty());
    }

    #[test]
    fn test_track_counts() {
        let db = test_rekordbox_db();
        let counts = db.playlist_track_counts().unwrap();
        assert_eq!(counts.get("11"), Some(&3));
        assert_eq!(counts.get("20"), Some(&1));
    }

    #[test]
    fn test_fixture_builds_tree() {
        let db = test_rekordbox_db();
        let tree = build_hierarchy(db.playlist_rows().unwrap()).unwrap();

        let techno = tree.find_by_path("Techno").unwrap();
        let children: Vec<&str> = techno.children.iter().map(|c| c.name()).collect();
        assert_eq!(children, vec!["Warm Up", "Peak Time"]);
        assert_eq!(tree.find_by_id("11").unwrap().path, vec!["Techno"]);
    }

    #[test]
    fn test_dump_schema() {
        let db = test_rekordbox_db();
        let schema = db.dump_schema().unwrap();

        let playlist = schema.iter().find(|o| o.name == "djmdPlaylist").unwrap();
        assert_eq!(playlist.kind, "table");
        assert!(playlist.to_string().starts_with("-- table: djmdPlaylist\nCREATE TABLE"));
    }

    #[test]
    fn test_open_encrypted_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA key = 'secret'; PRAGMA cipher_compatibility = 4;")
                .unwrap();
            conn.execute_batch(REKORDBOX_FIXTURE_SCHEMA).unwrap();
        }

        let db = RekordboxDb::open(&path, "secret").unwrap();
        assert!(db.playlist_rows().unwrap().is_empty());

        let err = RekordboxDb::open(&path, "wrong").err().unwrap();
        assert!(err.to_string().contains("wrong key?"));
    }
}
