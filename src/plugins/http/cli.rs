use crate::plugins::registry::{ArchiveConfig, CliPlugin};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Flags that shape how photo and listing requests look to the image host.
pub struct HttpCliPlugin;

/// `Name: value`, split on the first colon.
fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected `Name: value`, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header name is empty in {:?}", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliPlugin for HttpCliPlugin {
    fn augment_archive_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("referer")
                .long("referer")
                .help_heading("Requests")
                .help("Referer sent with every request; some photo CDNs refuse hotlinked images without one")
                .num_args(1),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .help_heading("Requests")
                .help("Additional request header as 'Name: value' (repeatable)")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("user_agent")
                .long("user-agent")
                .help_heading("Requests")
                .help("Override the desktop-browser User-Agent")
                .num_args(1),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help_heading("Requests")
                .help("Give up on a single page or photo request after this many seconds [default: 60]")
                .value_parser(value_parser!(u64).range(1..))
                .num_args(1),
        )
    }

    fn apply_archive_matches(&self, matches: &ArgMatches, cfg: &mut ArchiveConfig) -> anyhow::Result<()> {
        let ctx = &mut cfg.fetch_ctx;
        if let Some(ua) = matches.get_one::<String>("user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(secs) = matches.get_one::<u64>("timeout_secs") {
            ctx.timeout_secs = *secs;
        }
        for raw in matches.get_many::<String>("header").into_iter().flatten() {
            let (name, value) = parse_header(raw)?;
            ctx.headers.insert(name, value);
        }
        // Applied last so it wins over a `--header 'Referer: ...'`.
        if let Some(referer) = matches.get_one::<String>("referer") {
            ctx.headers.insert("Referer".to_string(), referer.clone());
        }
        Ok(())
    }
}
