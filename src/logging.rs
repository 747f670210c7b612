use anyhow::Context;
use crate::plugins::registry::ArchiveConfig;
use indicatif::MultiProgress;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Terminal log output that waits for the progress bars to step aside, so a
/// log line never lands in the middle of a spinner redraw.
pub struct ProgressLogWriter<W> {
    mp: MultiProgress,
    out: Arc<Mutex<W>>,
}

impl<W> ProgressLogWriter<W> {
    pub fn new(mp: MultiProgress, out: W) -> Self {
        Self { mp, out: Arc::new(Mutex::new(out)) }
    }
}

impl<'a, W: Write + Send + 'static> MakeWriter<'a> for ProgressLogWriter<W> {
    type Writer = LogLine<W>;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine { mp: self.mp.clone(), out: self.out.clone(), buf: Vec::new() }
    }
}

/// One formatted event, buffered and written out in a single piece on drop.
pub struct LogLine<W: Write> {
    mp: MultiProgress,
    out: Arc<Mutex<W>>,
    buf: Vec<u8>,
}

impl<W: Write> Write for LogLine<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for LogLine<W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let (buf, out) = (&self.buf, &self.out);
        self.mp.suspend(|| {
            if let Ok(mut out) = out.lock() {
                let _ = out.write_all(buf);
                let _ = out.flush();
            }
        });
    }
}

/// Terminal (through the progress bars) plus an append-only log file, both
/// filtered by the same level.
pub fn init_logging(cfg: &ArchiveConfig, mp: &MultiProgress) -> anyhow::Result<()> {
    let level = if cfg.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("listing_archiver={}", level)));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)
        .with_context(|| format!("open log file {}", cfg.log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(ProgressLogWriter::new(mp.clone(), io::stdout())))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()?;
    Ok(())
}
