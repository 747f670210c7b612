use crate::core::model::ListingId;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum ArchiveEvent {
    ListingResolved { listing_id: ListingId, name: String, dir: PathBuf, seed: String },
    Probing { listing_id: ListingId, url: String },
    ImageStored { listing_id: ListingId, position: usize, url: String, bytes: usize },
    Recovering { listing_id: ListingId, missed: String, next: String },
    Finished { listing_id: ListingId, images: usize },
    Error { scope: String, message: String },
}
