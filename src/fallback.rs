//! Image source fallback chain.
//!
//! When an image slot fails to load, [`resolve_next_source`] decides what the
//! slot should try next. The answer depends only on the original URL, the
//! attempt count, the optional known-good URL and the call site's
//! [`FallbackPolicy`]; the item id only shows up in the grid's stand-in
//! placeholder. No request is made here: the caller swaps the source and the
//! next load failure re-enters the chain with the next attempt count.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::commons::{commons_path, direct_file_url, force_secure, thumbnail_url};
use crate::constants::constants;
use crate::error::ResolveError;

/// Numeric archive item identifier.
pub type ItemId = u64;

/// Which view an image slot lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
  /// Portfolio grid thumbnail.
  Grid,
  /// Image inside the item modal.
  Modal,
}

impl SlotKind {
  pub fn label(self) -> &'static str {
    match self {
      SlotKind::Grid => "grid",
      SlotKind::Modal => "modal",
    }
  }
}

/// One image slot: the URL it was mounted with and the item it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
  pub original_url: String,
  pub item_id: ItemId,
}

impl ImageReference {
  pub fn new(original_url: impl Into<String>, item_id: ItemId) -> Self {
    Self { original_url: original_url.into(), item_id }
  }
}

/// A candidate generator. Rules that can't produce a URL for a given input
/// are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
  /// The previously validated alternate source for the same item.
  KnownGood,
  /// The repository's canonical direct-file endpoint.
  DirectFile,
  /// The repository's thumbnail endpoint, with a guessed shard directory.
  Thumbnail,
  /// The original URL with `http:` upgraded to `https:`.
  SecureTransport,
}

impl Rule {
  fn apply(self, original: &str, known_good: Option<&str>) -> Result<String, ResolveError> {
    match self {
      Rule::KnownGood => known_good
        .filter(|url| !url.is_empty() && *url != original)
        .map(str::to_string)
        .ok_or_else(|| ResolveError::parse(original, "no distinct known-good source")),
      Rule::DirectFile => commons_path(original).map(direct_file_url),
      Rule::Thumbnail => commons_path(original).and_then(thumbnail_url),
      Rule::SecureTransport => force_secure(original).ok_or_else(|| ResolveError::parse(original, "not plain http")),
    }
  }
}

/// What a terminal slot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
  /// Inline neutral SVG graphic.
  Embedded,
  /// External stand-in image keyed by item id.
  StandIn,
}

/// The fixed image a terminal slot renders, with its degraded presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
  pub url: String,
  pub alt: String,
  pub opacity: f32,
}

/// Outcome of one pass through the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "value", rename_all = "lowercase")]
pub enum NextAction {
  /// Point the slot at this URL and wait for the next load result.
  Retry(String),
  /// Stop retrying and render the placeholder.
  Terminal(Placeholder),
}

impl NextAction {
  pub fn is_terminal(&self) -> bool {
    matches!(self, NextAction::Terminal(_))
  }

  /// The source URL the slot should display next.
  pub fn source(&self) -> &str {
    match self {
      NextAction::Retry(url) => url,
      NextAction::Terminal(placeholder) => &placeholder.url,
    }
  }
}

/// Per-call-site ordering of rules and attempt budget.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
  pub kind: SlotKind,
  pub max_attempts: u32,
  pub rules: Vec<Rule>,
  pub placeholder: PlaceholderStyle,
}

impl FallbackPolicy {
  /// Grid thumbnails: quick repository rewrite, then https, then a stand-in photo.
  pub fn grid() -> Self {
    Self {
      kind: SlotKind::Grid,
      max_attempts: constants().grid_max_attempts,
      rules: vec![Rule::KnownGood, Rule::DirectFile, Rule::SecureTransport],
      placeholder: PlaceholderStyle::StandIn,
    }
  }

  /// Modal images: known-good first, every repository rewrite, then the inline graphic.
  pub fn modal() -> Self {
    Self {
      kind: SlotKind::Modal,
      max_attempts: constants().modal_max_attempts,
      rules: vec![Rule::KnownGood, Rule::DirectFile, Rule::Thumbnail, Rule::SecureTransport],
      placeholder: PlaceholderStyle::Embedded,
    }
  }

  pub fn for_kind(kind: SlotKind) -> Self {
    match kind {
      SlotKind::Grid => Self::grid(),
      SlotKind::Modal => Self::modal(),
    }
  }

  /// The ordered, de-duplicated list of URLs this policy would try.
  ///
  /// Never contains `original` itself, and is independent of the attempt count.
  /// `Rule::KnownGood` only counts while the list is still empty, so the
  /// known-good source can only ever be the first retry.
  pub fn candidates(&self, original: &str, known_good: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(self.rules.len());
    for rule in &self.rules {
      if *rule == Rule::KnownGood && !out.is_empty() {
        continue;
      }
      if let Ok(url) = rule.apply(original, known_good)
        && url != original
        && !out.contains(&url)
      {
        out.push(url);
      }
    }
    out
  }

  fn candidate_at(&self, original: &str, attempt: u32, known_good: Option<&str>) -> Result<String, ResolveError> {
    if attempt >= self.max_attempts {
      return Err(ResolveError::ExhaustedAttempts { attempts: attempt });
    }
    self
      .candidates(original, known_good)
      .into_iter()
      .nth(attempt as usize)
      .ok_or(ResolveError::ExhaustedAttempts { attempts: attempt })
  }

  pub fn placeholder_for(&self, item_id: ItemId) -> Placeholder {
    let c = constants();
    match self.placeholder {
      PlaceholderStyle::Embedded => Placeholder {
        url: embedded_placeholder_url(),
        alt: c.placeholder_alt.clone(),
        opacity: c.modal_placeholder_opacity,
      },
      PlaceholderStyle::StandIn => Placeholder {
        url: format!("{}{}", c.stand_in_url_base, item_id),
        alt: c.placeholder_alt.clone(),
        opacity: c.grid_placeholder_opacity,
      },
    }
  }
}

/// `data:` URI of the neutral placeholder graphic.
pub fn embedded_placeholder_url() -> String {
  format!("data:image/svg+xml;base64,{}", STANDARD.encode(constants().placeholder_svg.as_bytes()))
}

/// Decide what a failed image slot should try next.
///
/// `attempt_count` is how many times the slot has already been re-pointed.
/// `known_good_url` is only ever returned on the first retry, whatever the
/// policy's rule order.
pub fn resolve_next_source(
  policy: &FallbackPolicy,
  original_url: &str,
  attempt_count: u32,
  item_id: ItemId,
  known_good_url: Option<&str>,
) -> NextAction {
  match policy.candidate_at(original_url, attempt_count, known_good_url) {
    Ok(url) => NextAction::Retry(url),
    Err(_) => NextAction::Terminal(policy.placeholder_for(item_id)),
  }
}

/// Both call-site policies, passed to whoever handles load failures.
#[derive(Debug, Clone)]
pub struct Resolver {
  pub grid: FallbackPolicy,
  pub modal: FallbackPolicy,
}

impl Default for Resolver {
  fn default() -> Self {
    Self { grid: FallbackPolicy::grid(), modal: FallbackPolicy::modal() }
  }
}

impl Resolver {
  pub fn policy(&self, kind: SlotKind) -> &FallbackPolicy {
    match kind {
      SlotKind::Grid => &self.grid,
      SlotKind::Modal => &self.modal,
    }
  }

  pub fn resolve(
    &self,
    kind: SlotKind,
    reference: &ImageReference,
    attempt_count: u32,
    known_good_url: Option<&str>,
  ) -> NextAction {
    resolve_next_source(self.policy(kind), &reference.original_url, attempt_count, reference.item_id, known_good_url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const COMMONS: &str = "https://foo.wikimedia.org/wiki/commons/a/ab/example.jpg";

  fn retry(url: &str) -> NextAction {
    NextAction::Retry(url.to_string())
  }

  // --- first attempt ---

  #[test]
  fn repository_url_first_retry_is_direct_file() {
    for policy in [FallbackPolicy::grid(), FallbackPolicy::modal()] {
      assert_eq!(
        resolve_next_source(&policy, COMMONS, 0, 7, None),
        retry("https://upload.wikimedia.org/wikipedia/commons/a/ab/example.jpg")
      );
    }
  }

  #[test]
  fn known_good_wins_first_retry() {
    let action = resolve_next_source(&FallbackPolicy::modal(), COMMONS, 0, 7, Some("https://cdn.example/good.png"));
    assert_eq!(action, retry("https://cdn.example/good.png"));
  }

  #[test]
  fn known_good_equal_to_original_is_ignored() {
    let action = resolve_next_source(&FallbackPolicy::modal(), COMMONS, 0, 7, Some(COMMONS));
    assert_eq!(action, retry("https://upload.wikimedia.org/wikipedia/commons/a/ab/example.jpg"));
  }

  #[test]
  fn known_good_is_never_used_after_first_retry() {
    let policy = FallbackPolicy::modal();
    for attempt in 1..policy.max_attempts + 2 {
      let action = resolve_next_source(&policy, COMMONS, attempt, 7, Some("https://cdn.example/good.png"));
      assert_ne!(action.source(), "https://cdn.example/good.png");
    }
  }

  #[test]
  fn known_good_listed_late_is_skipped_after_first_candidate() {
    let policy = FallbackPolicy { rules: vec![Rule::DirectFile, Rule::KnownGood], ..FallbackPolicy::modal() };
    let known_good = Some("https://cdn.example/good.png");
    assert_eq!(
      resolve_next_source(&policy, COMMONS, 0, 7, known_good),
      retry("https://upload.wikimedia.org/wikipedia/commons/a/ab/example.jpg")
    );
    assert!(resolve_next_source(&policy, COMMONS, 1, 7, known_good).is_terminal());
  }

  #[test]
  fn known_good_listed_late_still_leads_when_nothing_precedes_it() {
    let policy = FallbackPolicy { rules: vec![Rule::DirectFile, Rule::KnownGood], ..FallbackPolicy::grid() };
    let action = resolve_next_source(&policy, "https://cdn.example/bad.jpg", 0, 7, Some("https://cdn.example/good.png"));
    assert_eq!(action, retry("https://cdn.example/good.png"));
  }

  #[test]
  fn terminal_serializes_placeholder_under_value() {
    let action = resolve_next_source(&FallbackPolicy::grid(), "", 3, 42, None);
    let json = serde_json::to_value(&action).unwrap();
    assert_eq!(json["action"], "terminal");
    assert_eq!(json["value"]["url"], "https://picsum.photos/800/600?random=42");
    let retry_json = serde_json::to_value(retry("https://a/b.jpg")).unwrap();
    assert_eq!(retry_json["value"], "https://a/b.jpg");
  }

  // --- modal ordering ---

  #[test]
  fn modal_walks_every_repository_rewrite() {
    let policy = FallbackPolicy::modal();
    let original = "http://commons.wikimedia.org/wiki/commons/d/d4/Dodo.jpg";
    let known_good = Some("https://cdn.example/dodo.png");
    let expected = [
      "https://cdn.example/dodo.png",
      "https://upload.wikimedia.org/wikipedia/commons/d/d4/Dodo.jpg",
      "https://upload.wikimedia.org/wikipedia/commons/thumb/d/do/Dodo.jpg/1200px-Dodo.jpg",
      "https://commons.wikimedia.org/wiki/commons/d/d4/Dodo.jpg",
    ];
    for (attempt, url) in expected.iter().enumerate() {
      assert_eq!(resolve_next_source(&policy, original, attempt as u32, 3, known_good), retry(url));
    }
    assert!(resolve_next_source(&policy, original, 4, 3, known_good).is_terminal());
  }

  #[test]
  fn modal_terminal_is_embedded_graphic() {
    let action = resolve_next_source(&FallbackPolicy::modal(), COMMONS, 4, 9, None);
    let NextAction::Terminal(placeholder) = action else { panic!("expected terminal") };
    assert!(placeholder.url.starts_with("data:image/svg+xml;base64,PHN2Zy"));
    assert_eq!(placeholder.alt, "Image not available");
    assert_eq!(placeholder.opacity, 0.5);
  }

  #[test]
  fn embedded_placeholder_matches_published_graphic() {
    assert_eq!(
      embedded_placeholder_url(),
      "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iODAwIiBoZWlnaHQ9IjYwMCIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iODAwIiBoZWlnaHQ9IjYwMCIgZmlsbD0iIzIyMjIyMiIvPjx0ZXh0IHg9IjUwJSIgeT0iNTAlIiBmb250LWZhbWlseT0iQXJpYWwiIGZvbnQtc2l6ZT0iMjQiIGZpbGw9IiM2NjY2NjYiIHRleHQtYW5jaG9yPSJtaWRkbGUiIGR5PSIuM2VtIj5JbWFnZSBub3QgYXZhaWxhYmxlPC90ZXh0Pjwvc3ZnPg=="
    );
  }

  // --- grid ordering ---

  #[test]
  fn grid_tries_direct_file_then_https() {
    let policy = FallbackPolicy::grid();
    let original = "http://commons.wikimedia.org/w/commons/1/12/Thylacine.jpg";
    assert_eq!(
      resolve_next_source(&policy, original, 0, 2, None),
      retry("https://upload.wikimedia.org/wikipedia/commons/1/12/Thylacine.jpg")
    );
    assert_eq!(
      resolve_next_source(&policy, original, 1, 2, None),
      retry("https://commons.wikimedia.org/w/commons/1/12/Thylacine.jpg")
    );
    assert!(resolve_next_source(&policy, original, 2, 2, None).is_terminal());
  }

  #[test]
  fn grid_terminal_is_stand_in_keyed_by_item() {
    let action = resolve_next_source(&FallbackPolicy::grid(), "", 3, 42, None);
    let NextAction::Terminal(placeholder) = action else { panic!("expected terminal") };
    assert_eq!(placeholder.url, "https://picsum.photos/800/600?random=42");
    assert_eq!(placeholder.opacity, 0.7);
  }

  // --- generic hosts ---

  #[test]
  fn plain_http_elsewhere_is_upgraded() {
    for policy in [FallbackPolicy::grid(), FallbackPolicy::modal()] {
      assert_eq!(
        resolve_next_source(&policy, "http://cdn.example/quagga.jpg?w=800", 0, 1, None),
        retry("https://cdn.example/quagga.jpg?w=800")
      );
      assert!(resolve_next_source(&policy, "http://cdn.example/quagga.jpg?w=800", 1, 1, None).is_terminal());
    }
  }

  #[test]
  fn https_elsewhere_goes_straight_to_terminal() {
    assert!(resolve_next_source(&FallbackPolicy::grid(), "https://cdn.example/moa.jpg", 0, 1, None).is_terminal());
  }

  #[test]
  fn repository_url_without_marker_falls_back_to_https() {
    let original = "http://commons.wikimedia.org/wiki/File:Dodo.jpg";
    assert_eq!(
      resolve_next_source(&FallbackPolicy::modal(), original, 0, 1, None),
      retry("https://commons.wikimedia.org/wiki/File:Dodo.jpg")
    );
  }

  #[test]
  fn duplicate_of_original_is_skipped() {
    let original = "https://upload.wikimedia.org/wikipedia/commons/a/ab/example.jpg";
    let candidates = FallbackPolicy::grid().candidates(original, None);
    assert!(candidates.is_empty());
  }

  // --- termination and malformed input ---

  #[test]
  fn at_max_is_terminal_for_any_input() {
    let inputs = ["", "not a url", "http://", "%%%", COMMONS, "https://x.wikimedia.org/commons/\n"];
    for policy in [FallbackPolicy::grid(), FallbackPolicy::modal()] {
      for input in inputs {
        assert!(resolve_next_source(&policy, input, policy.max_attempts, 0, None).is_terminal());
        assert!(resolve_next_source(&policy, input, u32::MAX, 0, Some("https://cdn.example/a.png")).is_terminal());
      }
    }
  }

  #[test]
  fn malformed_urls_never_panic() {
    let inputs = ["", "::::", "wikimedia.org", "wikimedia.org/commons/", "https://wikimedia.org/commons/%E0%A4", "日本/commons/語.jpg"];
    for policy in [FallbackPolicy::grid(), FallbackPolicy::modal()] {
      for input in inputs {
        for attempt in 0..=policy.max_attempts {
          let _ = resolve_next_source(&policy, input, attempt, 0, None);
        }
      }
    }
  }

  #[test]
  fn resolution_is_deterministic() {
    let policy = FallbackPolicy::modal();
    for attempt in 0..5 {
      assert_eq!(
        resolve_next_source(&policy, COMMONS, attempt, 1, Some("https://cdn.example/a.png")),
        resolve_next_source(&policy, COMMONS, attempt, 1, Some("https://cdn.example/a.png"))
      );
    }
  }

  // --- resolver ---

  #[test]
  fn resolver_dispatches_on_slot_kind() {
    let resolver = Resolver::default();
    let reference = ImageReference::new("https://cdn.example/none.jpg", 5);
    let NextAction::Terminal(grid) = resolver.resolve(SlotKind::Grid, &reference, 0, None) else { panic!() };
    let NextAction::Terminal(modal) = resolver.resolve(SlotKind::Modal, &reference, 0, None) else { panic!() };
    assert!(grid.url.starts_with("https://picsum.photos/"));
    assert!(modal.url.starts_with("data:"));
  }
}
