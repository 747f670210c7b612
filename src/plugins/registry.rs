use async_trait::async_trait;
use crate::core::model::{ListingInput, RecoveryPolicy, ResolvedListing};
use bytes::Bytes;
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("invalid request for {url}: {message}")]
    Request { url: String, message: String },

    #[error("transport failure for {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One HTTP GET. Any status comes back as a response; only a broken
/// connection, DNS failure or timeout is an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
pub trait StorageSink: Send {
    async fn write(&mut self, position: usize, bytes: &[u8]) -> std::io::Result<()>;
}

pub struct ResolveContext {
    pub fetcher: Arc<dyn Fetcher>,
}

#[async_trait]
pub trait ListingResolver: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_handle(&self, input: &ListingInput) -> u8;
    async fn resolve(&self, input: &ListingInput, ctx: &ResolveContext) -> anyhow::Result<ResolvedListing>;
}

#[derive(Debug, Clone)]
pub struct FetchContext {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub headers: HashMap<String, String>,
}

impl Default for FetchContext {
    fn default() -> Self {
        Self {
            user_agent: crate::plugins::http::driver::BROWSER_USER_AGENT.to_string(),
            timeout_secs: 60,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub out_root: PathBuf,
    pub recovery: RecoveryPolicy,
    pub debug: bool,
    pub log_file: PathBuf,
    pub fetch_ctx: FetchContext,
}

pub trait CliPlugin: Send + Sync {
    fn augment_archive_command(&self, cmd: Command) -> Command;
    fn apply_archive_matches(&self, matches: &ArgMatches, cfg: &mut ArchiveConfig) -> anyhow::Result<()>;
}

pub struct PluginRegistry {
    resolvers: Vec<Box<dyn ListingResolver>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self { resolvers: vec![], cli_plugins: vec![] };

        reg.resolvers.push(Box::new(crate::plugins::redfin::resolver::DirectSeedResolver));
        reg.resolvers.push(Box::new(crate::plugins::redfin::resolver::ListingPageResolver));

        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::HttpCliPlugin));
        reg
    }

    pub fn augment_archive_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_archive_command(c))
    }

    pub fn apply_archive_matches(&self, matches: &ArgMatches, cfg: &mut ArchiveConfig) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            p.apply_archive_matches(matches, cfg)?;
        }
        Ok(())
    }

    pub fn best_resolver(&self, input: &ListingInput) -> Option<&dyn ListingResolver> {
        self.resolvers
            .iter()
            .map(|r| (r.can_handle(input), r.as_ref()))
            .max_by_key(|(c, _)| *c)
            .and_then(|(c, r)| if c == 0 { None } else { Some(r) })
    }
}
