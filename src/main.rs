use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use url::Url;

use lacuna::archive::Archive;
use lacuna::config::{self, Config};
use lacuna::constants::constants;
use lacuna::fallback::{ImageReference, ItemId, Resolver, SlotKind};
use lacuna::probe::{self, ProbeOptions, SlotReport};
use lacuna::slot::ImageSlot;
use lacuna::{logging, report};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSlotKind {
  Grid,
  Modal,
}

impl From<CliSlotKind> for SlotKind {
  fn from(kind: CliSlotKind) -> Self {
    match kind {
      CliSlotKind::Grid => SlotKind::Grid,
      CliSlotKind::Modal => SlotKind::Modal,
    }
  }
}

#[derive(clap::Args, Debug)]
struct SlotArgs {
  /// Source URL the image was mounted with
  url: String,
  /// Which view the image lives in
  #[arg(short, long, default_value = "modal")]
  slot: CliSlotKind,
  /// Archive item id (keys the stand-in placeholder)
  #[arg(short, long, default_value_t = 0)]
  item_id: ItemId,
  /// Alternate source already known to load for this item
  #[arg(short, long)]
  known_good: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show what a slot should load after its N-th failure
  Resolve {
    #[command(flatten)]
    slot: SlotArgs,
    /// Failures already handled for this slot
    #[arg(short, long, default_value_t = 0)]
    attempt: u32,
    #[arg(long)]
    json: bool,
  },
  /// Print every source a slot walks through if nothing ever loads
  Chain {
    #[command(flatten)]
    slot: SlotArgs,
  },
  /// List archive items
  List { archive: PathBuf },
  /// Load every image in an archive and follow fallbacks on failure
  Audit {
    archive: PathBuf,
    /// Base URL for relative sources
    #[arg(short, long)]
    base_url: Option<String>,
    #[arg(short, long)]
    concurrency: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Show every attempt, not only those of degraded slots
    #[arg(short, long)]
    verbose: bool,
    #[arg(long)]
    json: bool,
    /// Exit with an error if any slot ends on a placeholder
    #[arg(long)]
    strict: bool,
  },
  /// Show or update saved preferences
  Config {
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    concurrency: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    user_agent: Option<String>,
  },
  /// Generate shell completions
  Completions { shell: Shell },
}

// --- Commands ---

fn slot_from_args(args: SlotArgs) -> ImageSlot {
  ImageSlot::new(args.slot.into(), ImageReference::new(args.url, args.item_id), args.known_good)
}

fn cmd_resolve(resolver: &Resolver, args: SlotArgs, attempt: u32, json: bool) -> Result<()> {
  let slot = slot_from_args(args);
  let action = resolver.resolve(slot.kind(), slot.reference(), attempt, slot.known_good());
  if json {
    println!("{}", serde_json::to_string_pretty(&action).context("Failed to serialize action")?);
  } else {
    println!("{}", report::render_action(&action));
  }
  Ok(())
}

fn cmd_chain(resolver: &Resolver, args: SlotArgs) {
  let mut slot = slot_from_args(args);
  let original = slot.reference().original_url.clone();
  let updates = slot.exhaust(resolver);
  print!("{}", report::render_chain(&original, &updates));
}

fn cmd_list(path: &std::path::Path) -> Result<()> {
  let archive = Archive::load(path)?;
  if archive.is_empty() {
    println!("No archive items found.");
    return Ok(());
  }
  print!("{}", report::render_items(&archive));
  Ok(())
}

fn probe_options(config: &Config) -> Result<ProbeOptions> {
  let base_url = config
    .base_url
    .as_deref()
    .map(|s| Url::parse(s).with_context(|| format!("Invalid base URL '{}'", s)))
    .transpose()?;
  let c = constants();
  Ok(ProbeOptions {
    base_url,
    concurrency: config.concurrency.unwrap_or(c.audit_concurrency),
    timeout: Duration::from_secs(config.timeout_secs.unwrap_or(c.audit_timeout_secs)),
    user_agent: config.user_agent.clone().unwrap_or_else(|| c.audit_user_agent.clone()),
  })
}

fn cmd_config(updates: Config) -> Result<()> {
  let mut config = Config::load();
  if updates != Config::default() {
    config.merge(updates);
    let path = config.save()?;
    info!(path = %path.display(), "config: saved");
    println!("Saved {}", path.display());
  } else if let Some(path) = config::config_path() {
    println!("# {}", path.display());
  }
  print!("{}", toml::to_string(&config).context("Failed to serialize config")?);
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = logging::init();
  let resolver = Resolver::default();

  match args.command {
    Command::Resolve { slot, attempt, json } => cmd_resolve(&resolver, slot, attempt, json)?,
    Command::Chain { slot } => cmd_chain(&resolver, slot),
    Command::List { archive } => cmd_list(&archive)?,
    Command::Audit { archive, base_url, concurrency, timeout_secs, verbose, json, strict } => {
      let mut config = Config::load();
      config.merge(Config { base_url, concurrency, timeout_secs, user_agent: None });
      let opts = probe_options(&config)?;
      let archive = Archive::load(&archive)?;
      let audit = probe::audit(&archive, &resolver, &opts).await?;

      if json {
        println!("{}", serde_json::to_string_pretty(&audit).context("Failed to serialize audit report")?);
      } else {
        print!("{}", report::render_audit(&audit, verbose));
      }

      let degraded = audit.count(SlotReport::degraded);
      if strict && degraded > 0 {
        bail!("{} image slot(s) ended on a placeholder", degraded);
      }
    }
    Command::Config { base_url, concurrency, timeout_secs, user_agent } => {
      cmd_config(Config { base_url, concurrency, timeout_secs, user_agent })?
    }
    Command::Completions { shell } => {
      clap_complete::generate(shell, &mut Args::command(), env!("CARGO_PKG_NAME"), &mut std::io::stdout());
    }
  }
  Ok(())
}
