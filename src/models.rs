use chrono::NaiveDateTime;

/// Parent id rekordbox uses for top-level playlists and folders.
pub const ROOT_PARENT_ID: &str = "root";

/// What a row in the playlist table represents (rekordbox `Attribute` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistKind {
    #[default]
    Playlist,
    Folder,
    SmartPlaylist,
}

impl PlaylistKind {
    pub fn from_attribute(attribute: i64) -> Self {
        match attribute {
            1 => PlaylistKind::Folder,
            4 => PlaylistKind::SmartPlaylist,
            _ => PlaylistKind::Playlist,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlaylistKind::Playlist => "playlist",
            PlaylistKind::Folder => "folder",
            PlaylistKind::SmartPlaylist => "smart playlist",
        }
    }
}

/// A playlist or folder row as read from the local catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRow {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub sequence: i64,
    pub kind: PlaylistKind,
    pub created_at: Option<NaiveDateTime>,
}

impl PlaylistRow {
    /// Whether the row sits directly under the catalog root.
    pub fn is_top_level(&self) -> bool {
        match self.parent_id.as_deref() {
            None => true,
            Some(parent) => parent.is_empty() || parent == ROOT_PARENT_ID,
        }
    }
}

/// A local track, trimmed of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub artist: String,
    pub title: String,
}

impl Track {
    pub fn new(artist: impl AsRef<str>, title: impl AsRef<str>) -> Self {
        Self {
            artist: artist.as_ref().trim().to_string(),
            title: title.as_ref().trim().to_string(),
        }
    }
}

/// Terminal (or initial) state of a single resolution task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    NotFound,
    SearchFailed(String),
}

/// Outcome of resolving the local track at `source_index`.
///
/// `remote_id` is empty when the track could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub source_index: usize,
    pub remote_id: String,
    pub remote_display_name: String,
    pub status: ResolutionStatus,
}

impl ResolvedTrack {
    pub fn pending(source_index: usize) -> Self {
        Self {
            source_index,
            remote_id: String::new(),
            remote_display_name: String::new(),
            status: ResolutionStatus::Pending,
        }
    }

    pub fn resolved(
        source_index: usize,
        remote_id: impl Into<String>,
        remote_display_name: impl Into<String>,
    ) -> Self {
        Self {
            source_index,
            remote_id: remote_id.into(),
            remote_display_name: remote_display_name.into(),
            status: ResolutionStatus::Resolved,
        }
    }

    pub fn unresolved(source_index: usize, status: ResolutionStatus) -> Self {
        Self {
            status,
            ..Self::pending(source_index)
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.remote_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(parent_id: Option<&str>) -> PlaylistRow {
        PlaylistRow {
            id: "1".into(),
            name: "Techno".into(),
            parent_id: parent_id.map(String::from),
            sequence: 0,
            kind: PlaylistKind::Playlist,
            created_at: None,
        }
    }

    #[test]
    fn test_top_level_parent_markers() {
        assert!(row(None).is_top_level());
        assert!(row(Some("")).is_top_level());
        assert!(row(Some("root")).is_top_level());
        assert!(!row(Some("42")).is_top_level());
    }

    #[test]
    fn test_track_new_trims() {
        let track = Track::new("  Artist\t", "\nTitle  ");
        assert_eq!(track.artist, "Artist");
        assert_eq!(track.title, "Title");
    }

    #[test]
    fn test_kind_from_attribute() {
        assert_eq!(PlaylistKind::from_attribute(0), PlaylistKind::Playlist);
        assert_eq!(PlaylistKind::from_attribute(1), PlaylistKind::Folder);
        assert_eq!(PlaylistKind::from_attribute(4), PlaylistKind::SmartPlaylist);
        assert_eq!(PlaylistKind::from_attribute(99), PlaylistKind::Playlist);
    }

    #[test]
    fn test_unresolved_has_empty_remote_id() {
        let track = ResolvedTrack::unresolved(3, ResolutionStatus::NotFound);
        assert_eq!(track.source_index, 3);
        assert!(!track.is_resolved());
        assert_eq!(track.status, ResolutionStatus::NotFound);
    }
}
