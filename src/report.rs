//! Plain-text rendering for the CLI.

use std::fmt::Write as _;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::archive::Archive;
use crate::fallback::NextAction;
use crate::probe::{AuditReport, ProbeOutcome, SlotReport};
use crate::slot::SlotUpdate;

/// Column widths for `list`.
const NAME_W: usize = 28;
const HABITAT_W: usize = 22;
const DATE_W: usize = 10;

/// Longest URL shown before eliding the middle of it.
const URL_W: usize = 96;

/// Truncate to `max_width` display columns, appending "…" if truncated.
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
  if s.width() <= max_width {
    return s.to_string();
  }
  let mut out = String::new();
  let mut used = 0;
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w + 1 > max_width {
      break;
    }
    out.push(c);
    used += w;
  }
  out.push('…');
  out
}

/// Pad with spaces to exactly `width` display columns (truncating first).
pub fn pad_to_width(s: &str, width: usize) -> String {
  let s = truncate_to_width(s, width);
  let pad = width.saturating_sub(s.width());
  format!("{}{}", s, " ".repeat(pad))
}

/// Keep both ends of a long URL; the host and the filename are what matter.
fn elide_url(url: &str) -> String {
  let count = url.chars().count();
  if count <= URL_W {
    return url.to_string();
  }
  let keep = (URL_W - 1) / 2;
  let head: String = url.chars().take(keep).collect();
  let tail: String = url.chars().skip(count - keep).collect();
  format!("{}…{}", head, tail)
}

pub fn render_action(action: &NextAction) -> String {
  match action {
    NextAction::Retry(url) => format!("retry     {}", url),
    NextAction::Terminal(p) => format!("terminal  {} (alt \"{}\", opacity {})", elide_url(&p.url), p.alt, p.opacity),
  }
}

pub fn render_chain(original: &str, updates: &[SlotUpdate]) -> String {
  let mut out = format!("  0  {}\n", original);
  for (i, update) in updates.iter().enumerate() {
    let line = match update {
      SlotUpdate::SetSource(url) => url.clone(),
      SlotUpdate::Degrade(p) => format!("[placeholder, opacity {}] {}", p.opacity, elide_url(&p.url)),
    };
    let _ = writeln!(out, "{:>3}  {}", i + 1, line);
  }
  out
}

pub fn render_items(archive: &Archive) -> String {
  let mut out = format!(
    "{:>4}  {}  {}  {}  images\n",
    "id",
    pad_to_width("name", NAME_W),
    pad_to_width("habitat", HABITAT_W),
    pad_to_width("extinct", DATE_W)
  );
  for item in archive.items() {
    let _ = writeln!(
      out,
      "{:>4}  {}  {}  {}  {}",
      item.id,
      pad_to_width(item.display_name(), NAME_W),
      pad_to_width(item.display_habitat(), HABITAT_W),
      pad_to_width(item.display_extinct_date(), DATE_W),
      1 + item.modal_sources().len()
    );
  }
  out
}

fn status_label(slot: &SlotReport) -> &'static str {
  if slot.loaded_original() {
    "ok"
  } else if slot.recovered() {
    "fallback"
  } else {
    "degraded"
  }
}

pub fn render_audit(report: &AuditReport, verbose: bool) -> String {
  let mut out = String::new();
  for slot in &report.slots {
    let shown = slot.resolved.as_deref().or(slot.placeholder.as_ref().map(|p| p.url.as_str())).unwrap_or("-");
    let _ = writeln!(
      out,
      "{:<8}  #{:<4} {:<5}  {} ({} tried)",
      status_label(slot),
      slot.item_id,
      slot.kind.label(),
      elide_url(shown),
      slot.attempts.len()
    );
    if verbose || slot.degraded() {
      for attempt in &slot.attempts {
        let detail = match &attempt.outcome {
          ProbeOutcome::Loaded { width, height } => format!("{}x{}", width, height),
          ProbeOutcome::Failed { reason } => reason.clone(),
        };
        let _ = writeln!(out, "            {}  {}", elide_url(&attempt.url), detail);
      }
    }
  }
  let _ = writeln!(
    out,
    "\n{} slots: {} ok, {} via fallback, {} degraded ({})",
    report.slots.len(),
    report.count(SlotReport::loaded_original),
    report.count(SlotReport::recovered),
    report.count(SlotReport::degraded),
    report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
  );
  out
}
