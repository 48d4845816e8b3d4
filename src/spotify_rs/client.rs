use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};

use crate::ports::spotify::{
    MAX_TRACKS_PER_REQUEST, PlaylistMutation, RemotePlaylist, RemoteTrack, RemoteUser,
    TrackSearch,
};
use crate::spotify_rs::types::{
    AddTracksRequest, CreatePlaylistRequest, SpotifyPage, SpotifyPlaylist, SpotifySearchResponse,
    SpotifyUser, track_uri,
};

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Spotify API client holding an already-issued user access token.
///
/// `reqwest::Client` pools connections and is safe to share between the
/// concurrent search tasks.
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl TrackSearch for SpotifyClient {
    async fn search_tracks(&self, query: &str) -> Result<Vec<RemoteTrack>> {
        let response = self
            .client
            .get(format!("{}/search", API_BASE_URL))
            .query(&[("q", query), ("type", "track")])
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let results: SpotifySearchResponse = response
            .json()
            .await
            .wrap_err("Failed to parse Spotify search response")?;

        Ok(results
            .tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|track| track.into_remote())
            .collect())
    }
}

#[async_trait::async_trait]
impl PlaylistMutation for SpotifyClient {
    /// Get the current user's profile
    async fn current_user(&self) -> Result<RemoteUser> {
        let response = self
            .client
            .get(format!("{}/me", API_BASE_URL))
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let user: SpotifyUser = response.json().await?;
        Ok(user.into())
    }

    /// Get all playlists of a user, following pagination
    async fn user_playlists(&self, owner_id: &str) -> Result<Vec<RemotePlaylist>> {
        let mut all_playlists = Vec::new();
        let mut next_url = Some(format!(
            "{}/users/{}/playlists?limit=50",
            API_BASE_URL, owner_id
        ));

        while let Some(url) = next_url {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?
                .error_for_status()?;

            let page: SpotifyPage<SpotifyPlaylist> = response.json().await?;
            all_playlists.extend(page.items.into_iter().map(RemotePlaylist::from));
            next_url = page.next;
        }

        Ok(all_playlists)
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<RemotePlaylist> {
        let response = self
            .client
            .post(format!("{}/users/{}/playlists", API_BASE_URL, owner_id))
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&CreatePlaylistRequest {
                name,
                description,
                public,
            })
            .send()
            .await?
            .error_for_status()?;

        let playlist: SpotifyPlaylist = response.json().await?;
        Ok(playlist.into())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        if track_ids.len() > MAX_TRACKS_PER_REQUEST {
            return Err(eyre!(
                "Cannot add {} tracks in one request (limit {})",
                track_ids.len(),
                MAX_TRACKS_PER_REQUEST
            ));
        }

        self.client
            .post(format!("{}/playlists/{}/tracks", API_BASE_URL, playlist_id))
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&AddTracksRequest {
                uris: track_ids.iter().map(|id| track_uri(id)).collect(),
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
