use color_eyre::eyre::{Result, WrapErr};
use tracing::instrument;

use crate::models::Track;
use crate::ports::catalog::Catalog;

/// Load the ordered tracks of a playlist from the catalog.
///
/// Artist and title are trimmed; catalog failures are fatal.
#[instrument(skip(catalog))]
pub fn load_tracks<C: Catalog + ?Sized>(catalog: &C, playlist_id: &str) -> Result<Vec<Track>> {
    let tracks = catalog
        .playlist_tracks(playlist_id)
        .wrap_err_with(|| format!("Failed to load tracks for playlist {}", playlist_id))?;

    let tracks: Vec<Track> = tracks
        .into_iter()
        .map(|track| Track::new(&track.artist, &track.title))
        .collect();

    tracing::debug!(num_tracks = tracks.len(), "Loaded playlist tracks");
    Ok(tracks)
}
