use crate::core::enumerator::GalleryEnumerator;
use crate::core::events::ArchiveEvent;
use crate::core::model::{ArchiveSummary, ListingId, ListingInput};
use crate::core::store::DirectorySink;
use crate::plugins::registry::{ArchiveConfig, Fetcher, PluginRegistry, ResolveContext};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

/// Resolves links to listings and archives each gallery into its own directory.
pub struct Engine {
    registry: Arc<PluginRegistry>,
    fetcher: Arc<dyn Fetcher>,
    config: ArchiveConfig,
    event_tx: broadcast::Sender<ArchiveEvent>,
}

impl Engine {
    pub fn new(registry: PluginRegistry, fetcher: Arc<dyn Fetcher>, config: ArchiveConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { registry: Arc::new(registry), fetcher, config, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.event_tx.subscribe()
    }

    /// Links are handled strictly one after another. A failing link is
    /// reported and does not stop the rest.
    pub async fn archive_all(&self, links: &[String]) -> Vec<anyhow::Result<ArchiveSummary>> {
        let mut out = Vec::with_capacity(links.len());
        for raw in links {
            let input = ListingInput { raw: raw.clone() };
            let r = self.archive(&input).await;
            if let Err(e) = &r {
                tracing::error!(link = %raw, error = %format!("{:#}", e), "listing failed");
                let _ = self.event_tx.send(ArchiveEvent::Error {
                    scope: format!("listing({})", raw),
                    message: format!("{:#}", e),
                });
            }
            out.push(r);
        }
        out
    }

    pub async fn archive(&self, input: &ListingInput) -> anyhow::Result<ArchiveSummary> {
        let listing_id = Uuid::new_v4();
        let span = tracing::info_span!("listing", id = %listing_id, link = %input.raw);
        self.archive_listing(listing_id, input).instrument(span).await
    }

    async fn archive_listing(&self, listing_id: ListingId, input: &ListingInput) -> anyhow::Result<ArchiveSummary> {
        let resolver = self
            .registry
            .best_resolver(input)
            .with_context(|| format!("no resolver for input: {}", input.raw))?;
        tracing::debug!(resolver = resolver.name(), fetcher = self.fetcher.name(), "resolving");

        let ctx = ResolveContext { fetcher: self.fetcher.clone() };
        let listing = resolver
            .resolve(input, &ctx)
            .await
            .with_context(|| format!("resolve({})", resolver.name()))?;

        let mut sink = DirectorySink::create(&self.config.out_root, &listing.name).await?;
        let seed = format!("{}{}", listing.seed_prefix, listing.seed_suffix);
        tracing::info!(listing = %listing.name, %seed, dir = %sink.dir().display(), "archiving gallery");
        let _ = self.event_tx.send(ArchiveEvent::ListingResolved {
            listing_id,
            name: listing.name.clone(),
            dir: sink.dir().to_path_buf(),
            seed,
        });

        let gallery = GalleryEnumerator::new(self.fetcher.clone(), self.config.recovery)
            .with_events(listing_id, self.event_tx.clone())
            .enumerate(&listing.seed_prefix, &listing.seed_suffix, &mut sink)
            .await
            .with_context(|| format!("archive gallery of {}", listing.name))?;

        Ok(ArchiveSummary {
            listing: listing.name,
            dir: sink.dir().to_path_buf(),
            gallery,
        })
    }
}
