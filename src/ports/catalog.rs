use color_eyre::eyre::Result;

use crate::models::{PlaylistRow, Track};

/// Read-only access to the local DJ catalog.
///
/// Implementations live in `rekordbox` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
pub trait Catalog {
    /// Every live playlist and folder row, in no particular order.
    fn playlist_rows(&self) -> Result<Vec<PlaylistRow>>;

    /// Tracks of one playlist, ordered by their position in the playlist.
    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>>;
}
