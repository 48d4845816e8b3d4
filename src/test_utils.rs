use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use rusqlite::Connection;

use crate::models::Track;
use crate::ports::spotify::{
    MAX_TRACKS_PER_REQUEST, PlaylistMutation, RemotePlaylist, RemoteTrack, RemoteUser,
    TrackSearch,
};
use crate::rekordbox::RekordboxDb;
use crate::services::normalize::search_query;

pub const TEST_USER: &str = "test_user";

/// In-memory stand-in for the Spotify API.
///
/// Search answers come from a query -> candidates table, with optional
/// per-query latency and failures. Playlists have set semantics: adding a
/// track that is already a member is a no-op.
#[derive(Default)]
pub struct FakeSpotify {
    results: HashMap<String, Vec<RemoteTrack>>,
    delays: HashMap<String, Duration>,
    failing_queries: HashSet<String>,
    failing_add_calls: HashSet<usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    playlists: Mutex<Vec<(RemotePlaylist, Vec<String>)>>,
    add_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `track` resolve to a remote track with id `remote_id`.
    pub fn with_match(mut self, track: &Track, remote_id: &str) -> Self {
        self.results.insert(
            search_query(track),
            vec![RemoteTrack {
                id: remote_id.to_string(),
                name: track.title.clone(),
                artists: vec![track.artist.clone()],
            }],
        );
        self
    }

    pub fn with_delay(mut self, track: &Track, delay: Duration) -> Self {
        self.delays.insert(search_query(track), delay);
        self
    }

    pub fn with_failing_search(mut self, track: &Track) -> Self {
        self.failing_queries.insert(search_query(track));
        self
    }

    /// Fail the add-tracks call with the given zero-based call number.
    pub fn with_failing_add_call(mut self, call: usize) -> Self {
        self.failing_add_calls.insert(call);
        self
    }

    pub fn with_playlist(self, id: &str, name: &str, owner_id: &str) -> Self {
        self.playlists.lock().unwrap().push((
            RemotePlaylist {
                id: id.to_string(),
                name: name.to_string(),
                owner_id: owner_id.to_string(),
            },
            Vec::new(),
        ));
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Track ids passed to each add-tracks call, including failed ones.
    pub fn add_calls(&self) -> Vec<Vec<String>> {
        self.add_calls.lock().unwrap().clone()
    }

    pub fn members(&self, playlist_id: &str) -> Vec<String> {
        self.playlists
            .lock()
            .unwrap()
            .iter()
            .find(|(playlist, _)| playlist.id == playlist_id)
            .map(|(_, members)| members.clone())
            .unwrap_or_default()
    }

    pub fn playlist_count(&self) -> usize {
        self.playlists.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TrackSearch for FakeSpotify {
    async fn search_tracks(&self, query: &str) -> Result<Vec<RemoteTrack>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_queries.contains(query) {
            return Err(eyre!("429 Too Many Requests"));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl PlaylistMutation for FakeSpotify {
    async fn current_user(&self) -> Result<RemoteUser> {
        Ok(RemoteUser {
            id: TEST_USER.to_string(),
            display_name: Some("Test User".to_string()),
        })
    }

    async fn user_playlists(&self, owner_id: &str) -> Result<Vec<RemotePlaylist>> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .iter()
            .filter(|(playlist, _)| playlist.owner_id == owner_id)
            .map(|(playlist, _)| playlist.clone())
            .collect())
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        _description: &str,
        _public: bool,
    ) -> Result<RemotePlaylist> {
        let mut playlists = self.playlists.lock().unwrap();
        let playlist = RemotePlaylist {
            id: format!("pl{}", playlists.len() + 1),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
        };
        playlists.push((playlist.clone(), Vec::new()));
        Ok(playlist)
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let call = {
            let mut calls = self.add_calls.lock().unwrap();
            calls.push(track_ids.to_vec());
            calls.len() - 1
        };
        if track_ids.len() > MAX_TRACKS_PER_REQUEST {
            return Err(eyre!("400 Bad Request: too many tracks"));
        }
        if self.failing_add_calls.contains(&call) {
            return Err(eyre!("502 Bad Gateway"));
        }

        let mut playlists = self.playlists.lock().unwrap();
        let (_, members) = playlists
            .iter_mut()
            .find(|(playlist, _)| playlist.id == playlist_id)
            .ok_or_else(|| eyre!("404 Not Found: playlist {}", playlist_id))?;
        for id in track_ids {
            if !members.contains(id) {
                members.push(id.clone());
            }
        }
        Ok(())
    }
}

/// Minimal slice of the rekordbox schema, unencrypted, in memory.
pub const REKORDBOX_FIXTURE_SCHEMA: &str = r#"
    CREATE TABLE djmdPlaylist (
        ID VARCHAR(255) PRIMARY KEY,
        Seq INTEGER,
        Name VARCHAR(255),
        ImagePath VARCHAR(255),
        Attribute INTEGER,
        ParentID VARCHAR(255),
        created_at TEXT NOT NULL,
        rb_local_deleted INTEGER DEFAULT 0
    );
    CREATE TABLE djmdArtist (
        ID VARCHAR(255) PRIMARY KEY,
        Name VARCHAR(255)
    );
    CREATE TABLE djmdContent (
        ID VARCHAR(255) PRIMARY KEY,
        Title VARCHAR(255),
        ArtistID VARCHAR(255),
        rb_local_deleted INTEGER DEFAULT 0
    );
    CREATE TABLE djmdSongPlaylist (
        ID VARCHAR(255) PRIMARY KEY,
        PlaylistID VARCHAR(255),
        ContentID VARCHAR(255),
        TrackNo INTEGER,
        rb_local_deleted INTEGER DEFAULT 0
    );
"#;

pub fn test_rekordbox_db() -> RekordboxDb {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(REKORDBOX_FIXTURE_SCHEMA).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO djmdPlaylist (ID, Seq, Name, Attribute, ParentID, created_at) VALUES
            ('10', 1, 'Techno', 1, 'root', '2023-04-01 10:00:00.000 +00:00'),
            ('11', 2, 'Peak Time', 0, '10', '2023-04-02 10:00:00.000 +00:00'),
            ('12', 1, 'Warm Up', 0, '10', 'not a date'),
            ('20', 2, 'House', 0, 'root', '2023-05-01 10:00:00'),
            ('30', 3, 'Deleted', 0, 'root', '2023-05-01 10:00:00');
        UPDATE djmdPlaylist SET rb_local_deleted = 1 WHERE ID = '30';

        INSERT INTO djmdArtist (ID, Name) VALUES
            ('a1', 'Charlotte de Witte'),
            ('a2', ' Amelie Lens ');

        INSERT INTO djmdContent (ID, Title, ArtistID) VALUES
            ('c1', 'Doppler (Original Mix)', 'a1'),
            ('c2', 'Hypnotized', 'a2'),
            ('c3', 'No Artist Tool', NULL),
            ('c4', 'Gone', 'a1');
        UPDATE djmdContent SET rb_local_deleted = 1 WHERE ID = 'c4';

        INSERT INTO djmdSongPlaylist (ID, PlaylistID, ContentID, TrackNo) VALUES
            ('s1', '11', 'c2', 2),
            ('s2', '11', 'c1', 1),
            ('s3', '11', 'c3', 3),
            ('s4', '11', 'c4', 4),
            ('s5', '20', 'c1', 1);
        "#,
    )
    .unwrap();
    RekordboxDb::from_connection(conn)
}
