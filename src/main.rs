mod core;
mod logging;
mod plugins;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use crate::core::engine::Engine;
use crate::core::events::ArchiveEvent;
use crate::core::model::RecoveryPolicy;
use crate::plugins::http::driver::HttpFetcher;
use crate::plugins::registry::{ArchiveConfig, FetchContext, PluginRegistry};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

fn build_cli(registry: &PluginRegistry) -> Command {
    let archive = Command::new("archive")
        .about("Download the photo gallery of one or more listings")
        .arg(
            Arg::new("links")
                .help("Listing page urls, or a big photo url to use as the seed directly")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Root directory; each listing gets its own folder")
                .default_value("./archives")
                .num_args(1),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Stop at the first missing photo instead of probing neighbours")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Log at debug level (RUST_LOG overrides)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log_file")
                .long("log-file")
                .help("Log file, appended to")
                .default_value("listing-archiver.log")
                .num_args(1),
        );

    let archive = registry.augment_archive_command(archive);

    Command::new("listing-archiver")
        .about("Archive real-estate listing photo galleries")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(archive)
}

fn archive_config(registry: &PluginRegistry, m: &ArgMatches) -> anyhow::Result<ArchiveConfig> {
    let mut cfg = ArchiveConfig {
        out_root: m.get_one::<String>("out_dir").context("out-dir")?.into(),
        recovery: if m.get_flag("strict") { RecoveryPolicy::Strict } else { RecoveryPolicy::TwoAxis },
        debug: m.get_flag("debug"),
        log_file: PathBuf::from(m.get_one::<String>("log_file").context("log-file")?),
        fetch_ctx: FetchContext::default(),
    };
    registry.apply_archive_matches(m, &mut cfg)?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = PluginRegistry::with_defaults();
    let app = build_cli(&registry);
    let matches = app.get_matches();

    match matches.subcommand() {
        Some(("archive", m)) => {
            let cfg = archive_config(&registry, m)?;
            let mp = MultiProgress::new();
            logging::init_logging(&cfg, &mp)?;
            tracing::debug!(?cfg, "configuration");

            tokio::fs::create_dir_all(&cfg.out_root).await
                .with_context(|| format!("create out dir {}", cfg.out_root.display()))?;

            let fetcher = Arc::new(HttpFetcher::new(&cfg.fetch_ctx)?);
            let engine = Engine::new(registry, fetcher, cfg);

            let links: Vec<String> = m
                .get_many::<String>("links")
                .context("links")?
                .cloned()
                .collect();

            let rx = engine.subscribe();
            let ui_task = tokio::spawn(progress_ui(mp, rx));

            let results = engine.archive_all(&links).await;
            // Closing the channel lets the UI task drain and exit.
            drop(engine);
            let _ = ui_task.await;

            println!();
            println!("Summary:");
            let mut failed = 0;
            for (link, r) in links.iter().zip(&results) {
                match r {
                    Ok(s) => {
                        let total: usize = s.gallery.images.iter().map(|i| i.bytes).sum();
                        println!(
                            "- {} -> {} image(s), {} in {}",
                            s.listing,
                            s.gallery.count(),
                            fmt_bytes(total as u64),
                            s.dir.display()
                        );
                        for img in &s.gallery.images {
                            println!("  image{}.jpg {} {}", img.position, fmt_bytes(img.bytes as u64), img.url);
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        println!("- {} failed: {:#}", link, e);
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} listing(s) failed", failed, links.len());
            }
        }
        _ => {}
    }

    Ok(())
}

async fn progress_ui(mp: MultiProgress, mut rx: tokio::sync::broadcast::Receiver<ArchiveEvent>) {
    let sty = ProgressStyle::with_template("{spinner:.green} {prefix} {pos} image(s) {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("|/-\\ ");

    let mut bars: HashMap<Uuid, ProgressBar> = HashMap::new();

    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        match evt {
            ArchiveEvent::ListingResolved { listing_id, name, dir, seed } => {
                let pb = mp.add(ProgressBar::new_spinner());
                pb.set_style(sty.clone());
                pb.set_prefix(format!("[{name}]"));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                pb.set_message(format!("seed {} -> {}", seed, dir.display()));
                bars.insert(listing_id, pb);
            }
            ArchiveEvent::Probing { listing_id, url } => {
                if let Some(pb) = bars.get(&listing_id) {
                    pb.set_message(format!("probing {}", url));
                }
            }
            ArchiveEvent::ImageStored { listing_id, position, url, bytes } => {
                if let Some(pb) = bars.get(&listing_id) {
                    pb.inc(1);
                    pb.set_message(format!("image{}.jpg {} <- {}", position, fmt_bytes(bytes as u64), url));
                }
            }
            ArchiveEvent::Recovering { listing_id, missed, next } => {
                if let Some(pb) = bars.get(&listing_id) {
                    pb.set_message(format!("missing {}, trying {}", missed, next));
                }
            }
            ArchiveEvent::Finished { listing_id, images } => {
                if let Some(pb) = bars.remove(&listing_id) {
                    pb.finish_with_message(format!("done, {} image(s)", images));
                }
            }
            ArchiveEvent::Error { scope, message } => {
                let _ = mp.println(format!("[ERR] {}: {}", scope, message));
            }
        }
    }

    for (_, pb) in bars.drain() {
        pb.abandon_with_message("stopped");
    }
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let f = n as f64;
    if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
