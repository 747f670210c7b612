use async_trait::async_trait;
use bytes::Bytes;
use crate::plugins::registry::{FetchError, FetchResponse, Fetcher, StorageSink};
use std::collections::HashMap;
use std::sync::Mutex;

pub enum Scripted {
    Body(&'static [u8]),
    Status(u16),
    Transport,
}

/// Fetcher answering from a fixed script. Unscripted urls get a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: impl Into<String>, reply: Scripted) -> Self {
        self.script.insert(url.into(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn name(&self) -> &'static str { "scripted" }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.script.get(url) {
            Some(Scripted::Body(b)) => Ok(FetchResponse { status: 200, body: Bytes::from_static(*b) }),
            Some(Scripted::Status(s)) => Ok(FetchResponse { status: *s, body: Bytes::new() }),
            Some(Scripted::Transport) => Err(FetchError::Transport {
                url: url.to_string(),
                source: "connection refused".into(),
            }),
            None => Ok(FetchResponse { status: 404, body: Bytes::new() }),
        }
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub written: Vec<(usize, Vec<u8>)>,
    pub fail_at: Option<usize>,
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn write(&mut self, position: usize, bytes: &[u8]) -> std::io::Result<()> {
        if self.fail_at == Some(position) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        }
        self.written.push((position, bytes.to_vec()));
        Ok(())
    }
}
