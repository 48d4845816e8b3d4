use serde::{Deserialize, Serialize};

use crate::ports::spotify::{RemotePlaylist, RemoteTrack, RemoteUser};

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// One page of a paginated Spotify listing
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPage<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyOwner {
    pub id: String,
}

/// Spotify playlist from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub owner: SpotifyOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

/// Spotify track from API. Local files in a user's library have no id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySearchResponse {
    pub tracks: Option<SpotifyPage<SpotifyTrack>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTracksRequest {
    pub uris: Vec<String>,
}

impl From<SpotifyUser> for RemoteUser {
    fn from(user: SpotifyUser) -> Self {
        RemoteUser {
            id: user.id,
            display_name: user.display_name,
        }
    }
}

impl From<SpotifyPlaylist> for RemotePlaylist {
    fn from(playlist: SpotifyPlaylist) -> Self {
        RemotePlaylist {
            id: playlist.id,
            name: playlist.name,
            owner_id: playlist.owner.id,
        }
    }
}

impl SpotifyTrack {
    pub fn into_remote(self) -> Option<RemoteTrack> {
        Some(RemoteTrack {
            id: self.id?,
            name: self.name,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
        })
    }
}

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}
