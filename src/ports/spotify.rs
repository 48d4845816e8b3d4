use color_eyre::eyre::Result;

/// Maximum number of tracks Spotify accepts per add-tracks call.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

/// Decoupled representation of a Spotify search candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
}

impl RemoteTrack {
    /// "Artist - Title" for logs and dry-run output.
    pub fn display_name(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} - {}", artist, self.name),
            None => self.name.clone(),
        }
    }
}

/// Decoupled representation of a Spotify playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Free-text track search. Shared across concurrent match tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TrackSearch: Send + Sync {
    /// Candidates for `query`, best first. Only the first page is returned.
    async fn search_tracks(&self, query: &str) -> Result<Vec<RemoteTrack>>;
}

/// Playlist reads and writes used by the sync step.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistMutation: Send + Sync {
    async fn current_user(&self) -> Result<RemoteUser>;

    async fn user_playlists(&self, owner_id: &str) -> Result<Vec<RemotePlaylist>>;

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<RemotePlaylist>;

    /// Append `track_ids` (at most [`MAX_TRACKS_PER_REQUEST`]) to the playlist.
    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}
