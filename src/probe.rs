//! Network audit of an archive's images.
//!
//! For each slot this does what the browser does: load the current source,
//! and on failure hand the slot to the fallback chain and load whatever it
//! points at next. The chain itself never touches the network; all requests
//! happen here.

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::archive::Archive;
use crate::fallback::{ItemId, Placeholder, Resolver, SlotKind};
use crate::slot::{ImageSlot, SlotState, SlotUpdate};

/// Knobs for an audit run.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
  /// Base that relative sources (`assets/...`) are resolved against.
  pub base_url: Option<Url>,
  pub concurrency: usize,
  pub timeout: Duration,
  pub user_agent: String,
}

/// Result of loading one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ProbeOutcome {
  Loaded { width: u32, height: u32 },
  Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeAttempt {
  pub url: String,
  #[serde(flatten)]
  pub outcome: ProbeOutcome,
}

/// Everything that happened to one slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotReport {
  pub item_id: ItemId,
  pub kind: SlotKind,
  pub original_url: String,
  pub attempts: Vec<ProbeAttempt>,
  /// The source that finally loaded, if any.
  pub resolved: Option<String>,
  pub placeholder: Option<Placeholder>,
  pub final_state: SlotState,
}

impl SlotReport {
  pub fn loaded_original(&self) -> bool {
    self.resolved.as_deref() == Some(self.original_url.as_str())
  }

  pub fn recovered(&self) -> bool {
    self.resolved.is_some() && !self.loaded_original()
  }

  pub fn degraded(&self) -> bool {
    self.resolved.is_none()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
  pub generated_at: DateTime<Utc>,
  pub slots: Vec<SlotReport>,
}

impl AuditReport {
  pub fn count(&self, pred: impl Fn(&SlotReport) -> bool) -> usize {
    self.slots.iter().filter(|s| pred(s)).count()
  }
}

pub fn build_client(opts: &ProbeOptions) -> Result<Client> {
  Client::builder()
    .timeout(opts.timeout)
    .user_agent(opts.user_agent.clone())
    .build()
    .context("Failed to build HTTP client")
}

/// Turn a slot source into something fetchable.
pub fn absolutize(src: &str, base: Option<&Url>) -> Result<String> {
  if src.is_empty() {
    bail!("empty source");
  }
  match Url::parse(src) {
    Ok(url) => Ok(url.to_string()),
    Err(url::ParseError::RelativeUrlWithoutBase) => match base {
      Some(base) => Ok(base.join(src).with_context(|| format!("cannot join '{}' onto {}", src, base))?.to_string()),
      None => Err(anyhow!("relative source '{}' needs --base-url", src)),
    },
    Err(e) => Err(anyhow!(e).context(format!("unparseable source '{}'", src))),
  }
}

fn decode_data_url(src: &str) -> Result<Vec<u8>> {
  let rest = src.strip_prefix("data:").ok_or_else(|| anyhow!("not a data URL"))?;
  let (meta, payload) = rest.split_once(',').ok_or_else(|| anyhow!("data URL has no payload"))?;
  if meta.ends_with(";base64") {
    STANDARD.decode(payload).context("data URL payload is not base64")
  } else {
    Ok(percent_encoding::percent_decode_str(payload).collect())
  }
}

/// Load one source and check that it decodes as an image.
pub async fn probe_source(client: &Client, url: &str) -> Result<(u32, u32)> {
  let bytes = if url.starts_with("data:") {
    decode_data_url(url)?
  } else {
    let response = client.get(url).send().await.with_context(|| format!("request to {} failed", url))?;
    if !response.status().is_success() {
      bail!("HTTP {}", response.status());
    }
    response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?.to_vec()
  };
  let image = image::load_from_memory(&bytes).context("Failed to decode image")?;
  Ok((image.width(), image.height()))
}

/// Drive one slot through load failures until something loads or it goes terminal.
pub async fn walk_slot(client: &Client, resolver: &Resolver, mut slot: ImageSlot, base: Option<&Url>) -> SlotReport {
  let mut attempts = Vec::new();
  let mut resolved = None;

  loop {
    let src = slot.current_source().to_string();
    let result = match absolutize(&src, base) {
      Ok(url) => probe_source(client, &url).await,
      Err(e) => Err(e),
    };
    match result {
      Ok((width, height)) => {
        debug!(url = %src, width, height, "probe: loaded");
        attempts.push(ProbeAttempt { url: src.clone(), outcome: ProbeOutcome::Loaded { width, height } });
        resolved = Some(src);
        break;
      }
      Err(e) => {
        debug!(url = %src, err = %format!("{:#}", e), "probe: failed");
        attempts.push(ProbeAttempt { url: src, outcome: ProbeOutcome::Failed { reason: format!("{:#}", e) } });
      }
    }
    match slot.on_load_error(resolver) {
      Some(SlotUpdate::SetSource(_)) => continue,
      Some(SlotUpdate::Degrade(_)) | None => break,
    }
  }

  SlotReport {
    item_id: slot.reference().item_id,
    kind: slot.kind(),
    original_url: slot.reference().original_url.clone(),
    attempts,
    resolved,
    placeholder: slot.placeholder().cloned(),
    final_state: slot.state(),
  }
}

/// Audit every slot in the archive, at most `opts.concurrency` at a time.
pub async fn audit(archive: &Archive, resolver: &Resolver, opts: &ProbeOptions) -> Result<AuditReport> {
  let client = build_client(opts)?;
  let slots = archive.slots();
  info!(slots = slots.len(), concurrency = opts.concurrency, "audit: starting");

  let base = opts.base_url.as_ref();
  let mut reports: Vec<(usize, SlotReport)> = stream::iter(slots.into_iter().enumerate())
    .map(|(idx, slot)| {
      let client = &client;
      async move { (idx, walk_slot(client, resolver, slot, base).await) }
    })
    .buffer_unordered(opts.concurrency.max(1))
    .collect()
    .await;
  reports.sort_by_key(|(idx, _)| *idx);

  let report = AuditReport { generated_at: Utc::now(), slots: reports.into_iter().map(|(_, r)| r).collect() };
  info!(
    degraded = report.count(SlotReport::degraded),
    recovered = report.count(SlotReport::recovered),
    "audit: complete"
  );
  Ok(report)
}
