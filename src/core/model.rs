use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

pub type ListingId = Uuid;

#[derive(Debug, Clone)]
pub struct ListingInput {
    pub raw: String,
}

/// How the enumerator reacts to a missing candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Probe one suffix bump, then one index bump, before giving up.
    #[default]
    TwoAxis,
    /// First miss ends the gallery.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedListing {
    pub name: String,
    pub seed_prefix: String,
    pub seed_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Found { bytes: usize },
    NotFound { status: u16 },
    Transport,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { bytes } => write!(f, "found ({} bytes)", bytes),
            Self::NotFound { status } => write!(f, "missing (status {})", status),
            Self::Transport => f.write_str("transport error"),
        }
    }
}

/// One fetch-and-decide step. Only lives long enough to be logged.
#[derive(Debug, Clone)]
pub struct DownloadAttempt {
    pub url: String,
    pub outcome: AttemptOutcome,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub position: usize,
    pub url: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GalleryResult {
    pub images: Vec<StoredImage>,
}

impl GalleryResult {
    pub fn count(&self) -> usize {
        self.images.len()
    }

    pub fn next_position(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn record(&mut self, url: String, bytes: usize) -> usize {
        let position = self.next_position();
        self.images.push(StoredImage { position, url, bytes });
        position
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub listing: String,
    pub dir: PathBuf,
    pub gallery: GalleryResult,
}
