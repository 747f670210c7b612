use crate::core::events::ArchiveEvent;
use crate::core::machine::{Action, Outcome, ProbeState};
use crate::core::model::{AttemptOutcome, DownloadAttempt, GalleryResult, ListingId, RecoveryPolicy};
use crate::core::pattern::{ImageUrlPattern, PatternError};
use crate::plugins::registry::{FetchError, Fetcher, StorageSink};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(thiserror::Error, Debug)]
pub enum GalleryError {
    #[error("malformed seed pattern")]
    MalformedSeed(#[from] PatternError),

    #[error("transport failure at {url}")]
    Transport {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to store image {position}")]
    Storage {
        position: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Walks a listing's photo urls from a seed, one fetch at a time, and streams
/// every hit into the sink. Running out of photos is the normal way out.
pub struct GalleryEnumerator {
    fetcher: Arc<dyn Fetcher>,
    policy: RecoveryPolicy,
    events: Option<(ListingId, broadcast::Sender<ArchiveEvent>)>,
}

impl GalleryEnumerator {
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: RecoveryPolicy) -> Self {
        Self { fetcher, policy, events: None }
    }

    pub fn with_events(mut self, listing_id: ListingId, tx: broadcast::Sender<ArchiveEvent>) -> Self {
        self.events = Some((listing_id, tx));
        self
    }

    fn emit(&self, make: impl FnOnce(ListingId) -> ArchiveEvent) {
        if let Some((id, tx)) = &self.events {
            let _ = tx.send(make(*id));
        }
    }

    pub async fn enumerate<S>(
        &self,
        seed_prefix: &str,
        seed_suffix: &str,
        sink: &mut S,
    ) -> Result<GalleryResult, GalleryError>
    where
        S: StorageSink + ?Sized,
    {
        let pattern = ImageUrlPattern::from_seed(seed_prefix, seed_suffix)?;
        tracing::debug!(prefix = pattern.prefix(), suffix = %pattern.suffix, policy = ?self.policy, "enumerating gallery");

        let mut state = ProbeState::start(pattern, self.policy);
        let mut result = GalleryResult::default();

        while !state.is_done() {
            let url = state.candidate();
            let slot = result.next_position();
            self.emit(|listing_id| ArchiveEvent::Probing { listing_id, url: url.clone() });

            let resp = match self.fetcher.fetch(&url).await {
                Ok(r) => r,
                Err(source) => {
                    let attempt = DownloadAttempt { url: url.clone(), outcome: AttemptOutcome::Transport, slot };
                    tracing::error!(url = %attempt.url, slot = attempt.slot, outcome = %attempt.outcome, error = %source, "transport failure, abandoning listing");
                    return Err(GalleryError::Transport { url, source });
                }
            };

            let (outcome, attempt_outcome) = if resp.is_ok() {
                (Outcome::Found, AttemptOutcome::Found { bytes: resp.body.len() })
            } else {
                (Outcome::Missing, AttemptOutcome::NotFound { status: resp.status })
            };
            let attempt = DownloadAttempt { url, outcome: attempt_outcome, slot };
            tracing::debug!(url = %attempt.url, slot = attempt.slot, outcome = %attempt.outcome, "probed");

            let (next, action) = state.step(outcome);
            match action {
                Action::Store => {
                    sink.write(slot, &resp.body)
                        .await
                        .map_err(|source| GalleryError::Storage { position: slot, source })?;
                    let position = result.record(attempt.url.clone(), resp.body.len());
                    tracing::info!(position, url = %attempt.url, bytes = resp.body.len(), "stored image");
                    self.emit(|listing_id| ArchiveEvent::ImageStored {
                        listing_id,
                        position,
                        url: attempt.url,
                        bytes: resp.body.len(),
                    });
                }
                Action::Retry => {
                    let upcoming = next.candidate();
                    tracing::debug!(
                        missed = %attempt.url,
                        next = %upcoming,
                        middle_index = next.pattern.middle_index,
                        suffix_number = ?next.pattern.suffix.number(),
                        "candidate missing, probing neighbour"
                    );
                    self.emit(|listing_id| ArchiveEvent::Recovering { listing_id, missed: attempt.url, next: upcoming });
                }
                Action::Stop => {}
            }
            state = next;
        }

        tracing::info!(images = result.count(), "gallery exhausted");
        self.emit(|listing_id| ArchiveEvent::Finished { listing_id, images: result.count() });
        Ok(result)
    }
}
