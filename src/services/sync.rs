use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use tracing::instrument;

use crate::models::ResolvedTrack;
use crate::ports::spotify::{MAX_TRACKS_PER_REQUEST, PlaylistMutation, RemotePlaylist};

pub const DEFAULT_PLAYLIST_DESCRIPTION: &str = "exported from rekordbox";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Track ids per add-tracks call, at most [`MAX_TRACKS_PER_REQUEST`].
    pub batch_size: usize,
    /// Description for playlists created by the sync.
    pub description: String,
    pub public: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_TRACKS_PER_REQUEST,
            description: DEFAULT_PLAYLIST_DESCRIPTION.to_string(),
            public: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub remote_id: String,
    pub display_name: String,
}

/// Resolved track ids in input order, split into add-tracks batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    entries: Vec<PlanEntry>,
    batch_size: usize,
    skipped: usize,
}

impl SyncPlan {
    /// Unresolved slots are left out and counted as skipped.
    pub fn new(resolved: &[ResolvedTrack], batch_size: usize) -> Self {
        let entries: Vec<PlanEntry> = resolved
            .iter()
            .filter(|track| track.is_resolved())
            .map(|track| PlanEntry {
                remote_id: track.remote_id.clone(),
                display_name: track.remote_display_name.clone(),
            })
            .collect();
        let skipped = resolved.len() - entries.len();

        Self {
            entries,
            batch_size: batch_size.clamp(1, MAX_TRACKS_PER_REQUEST),
            skipped,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn batches(&self) -> impl Iterator<Item = &[PlanEntry]> {
        self.entries.chunks(self.batch_size)
    }

    pub fn batch_count(&self) -> usize {
        self.entries.len().div_ceil(self.batch_size)
    }
}

/// Tally of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub failed_to_add: usize,
    /// Unresolved tracks that were never sent.
    pub not_added: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Applies resolved track ids to a remote playlist in batches.
pub struct SyncEngine<M: PlaylistMutation + ?Sized> {
    client: Arc<M>,
    settings: SyncSettings,
}

impl<M: PlaylistMutation + ?Sized> SyncEngine<M> {
    pub fn new(client: Arc<M>, settings: SyncSettings) -> Self {
        Self { client, settings }
    }

    /// Find the playlist named `name` owned by `owner_id`, or create it.
    #[instrument(skip(self))]
    pub async fn resolve_target(&self, owner_id: &str, name: &str) -> Result<RemotePlaylist> {
        let playlists = self
            .client
            .user_playlists(owner_id)
            .await
            .wrap_err("Failed to list playlists")?;

        if let Some(existing) = playlists
            .into_iter()
            .find(|p| p.owner_id == owner_id && p.name == name)
        {
            tracing::info!(id = %existing.id, "Found existing playlist");
            return Ok(existing);
        }

        tracing::info!("Creating playlist");
        self.client
            .create_playlist(
                owner_id,
                name,
                &self.settings.description,
                self.settings.public,
            )
            .await
            .wrap_err_with(|| format!("Failed to create playlist '{}'", name))
    }

    /// Add every resolved track to the playlist, one call per batch, in
    /// order. A failed batch is logged and counted; later batches still run.
    #[instrument(skip(self, resolved), fields(num_tracks = resolved.len()))]
    pub async fn apply(&self, playlist_id: &str, resolved: &[ResolvedTrack]) -> SyncReport {
        let plan = SyncPlan::new(resolved, self.settings.batch_size);
        let mut report = SyncReport {
            not_added: plan.skipped(),
            ..Default::default()
        };

        tracing::info!(
            tracks = plan.len(),
            batches = plan.batch_count(),
            skipped = plan.skipped(),
            "Adding tracks to playlist"
        );

        for (batch_number, batch) in plan.batches().enumerate() {
            let ids: Vec<String> = batch.iter().map(|e| e.remote_id.clone()).collect();
            report.batches += 1;

            match self.client.add_tracks(playlist_id, &ids).await {
                Ok(()) => {
                    report.added += ids.len();
                    tracing::debug!(batch_number, size = ids.len(), "Added batch");
                }
                Err(e) => {
                    report.failed_to_add += ids.len();
                    report.failed_batches += 1;
                    let names: Vec<&str> = batch.iter().map(|e| e.display_name.as_str()).collect();
                    tracing::error!(
                        batch_number,
                        error = ?e,
                        tracks = ?names,
                        "Could not add tracks to playlist"
                    );
                }
            }
        }

        tracing::info!(
            added = report.added,
            failed = report.failed_to_add,
            not_added = report.not_added,
            "Sync complete"
        );
        report
    }
}
