use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;

use futures::future::join_all;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use tokio::sync::Semaphore;
use tracing::{Instrument, instrument};

use crate::models::{ResolutionStatus, ResolvedTrack, Track};
use crate::ports::spotify::TrackSearch;
use crate::services::normalize::search_query;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Knobs for the match fan-out. Both limits are off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSettings {
    /// Maximum number of searches in flight at once.
    pub concurrency: Option<NonZeroUsize>,
    /// Maximum number of searches started per second.
    pub searches_per_second: Option<NonZeroU32>,
}

/// Result of a match run: one slot per input track, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub tracks: Vec<ResolvedTrack>,
}

impl MatchReport {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_resolved()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.len() - self.resolved_count()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedTrack> {
        self.tracks.iter().filter(|t| !t.is_resolved())
    }
}

/// Resolves local tracks to remote track ids by text search, one task per
/// track.
pub struct MatchEngine<S: TrackSearch + ?Sized + 'static> {
    search: Arc<S>,
    semaphore: Option<Arc<Semaphore>>,
    rate_limiter: Option<Arc<DirectRateLimiter>>,
}

impl<S: TrackSearch + ?Sized + 'static> MatchEngine<S> {
    pub fn new(search: Arc<S>, settings: &MatchSettings) -> Self {
        Self {
            search,
            semaphore: settings
                .concurrency
                .map(|limit| Arc::new(Semaphore::new(limit.get()))),
            rate_limiter: settings
                .searches_per_second
                .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate)))),
        }
    }

    /// Resolve every track. The output has exactly one slot per input track
    /// and `output[i].source_index == i`, whatever order searches finish in.
    /// Failed or empty searches leave an unresolved slot; they never abort
    /// the run.
    #[instrument(skip(self, tracks), fields(num_tracks = tracks.len()))]
    pub async fn resolve(&self, tracks: &[Track]) -> MatchReport {
        let handles: Vec<_> = tracks
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, track)| {
                let search = Arc::clone(&self.search);
                let semaphore = self.semaphore.clone();
                let rate_limiter = self.rate_limiter.clone();
                tokio::spawn(
                    async move {
                        let _permit = match semaphore {
                            Some(semaphore) => semaphore.acquire_owned().await.ok(),
                            None => None,
                        };
                        if let Some(rate_limiter) = rate_limiter {
                            rate_limiter.until_ready().await;
                        }
                        resolve_one(search.as_ref(), index, &track).await
                    }
                    .in_current_span(),
                )
            })
            .collect();

        let mut slots: Vec<ResolvedTrack> =
            (0..tracks.len()).map(ResolvedTrack::pending).collect();

        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let outcome = joined.unwrap_or_else(|e| {
                tracing::error!(index, error = ?e, "Match task failed");
                ResolvedTrack::unresolved(
                    index,
                    ResolutionStatus::SearchFailed(format!("match task failed: {}", e)),
                )
            });
            let slot = outcome.source_index;
            slots[slot] = outcome;
        }

        let report = MatchReport { tracks: slots };
        tracing::info!(
            resolved = report.resolved_count(),
            unresolved = report.unresolved_count(),
            "Matching complete"
        );
        report
    }
}

async fn resolve_one<S: TrackSearch + ?Sized>(
    search: &S,
    index: usize,
    track: &Track,
) -> ResolvedTrack {
    let query = search_query(track);
    tracing::debug!(index, %query, "Searching for track");

    match search.search_tracks(&query).await {
        Ok(candidates) => match candidates.into_iter().next() {
            Some(candidate) => {
                let display_name = candidate.display_name();
                tracing::debug!(index, id = %candidate.id, %display_name, "Resolved track");
                ResolvedTrack::resolved(index, candidate.id, display_name)
            }
            None => {
                tracing::warn!(
                    artist = %track.artist,
                    title = %track.title,
                    %query,
                    "Could not find track"
                );
                ResolvedTrack::unresolved(index, ResolutionStatus::NotFound)
            }
        },
        Err(e) => {
            tracing::warn!(
                artist = %track.artist,
                title = %track.title,
                error = ?e,
                "Track search failed"
            );
            ResolvedTrack::unresolved(index, ResolutionStatus::SearchFailed(e.to_string()))
        }
    }
}
