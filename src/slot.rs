//! Per-element attempt tracking.
//!
//! An [`ImageSlot`] stands in for one on-screen image element. It owns its
//! attempt counter, so slots never share state, and it moves through
//! `Pending -> Retrying(n) -> Terminal` one load failure at a time.

use serde::Serialize;
use tracing::{debug, warn};

use crate::fallback::{ImageReference, NextAction, Placeholder, Resolver, SlotKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "attempt", rename_all = "lowercase")]
pub enum SlotState {
  /// Showing the original source; no failure seen yet.
  Pending,
  /// Showing the n-th fallback source.
  Retrying(u32),
  /// Showing the placeholder. No further changes.
  Terminal,
}

/// Mutation the owner applies to the real element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "update", content = "value", rename_all = "snake_case")]
pub enum SlotUpdate {
  SetSource(String),
  /// Show the placeholder, swap the accessible text, reduce opacity.
  Degrade(Placeholder),
}

#[derive(Debug, Clone)]
pub struct ImageSlot {
  kind: SlotKind,
  reference: ImageReference,
  known_good: Option<String>,
  attempts: u32,
  state: SlotState,
  source: String,
  placeholder: Option<Placeholder>,
}

impl ImageSlot {
  pub fn new(kind: SlotKind, reference: ImageReference, known_good: Option<String>) -> Self {
    let source = reference.original_url.clone();
    Self { kind, reference, known_good, attempts: 0, state: SlotState::Pending, source, placeholder: None }
  }

  pub fn kind(&self) -> SlotKind {
    self.kind
  }

  pub fn reference(&self) -> &ImageReference {
    &self.reference
  }

  pub fn known_good(&self) -> Option<&str> {
    self.known_good.as_deref()
  }

  /// Number of fallback sources tried so far.
  pub fn attempts(&self) -> u32 {
    self.attempts
  }

  pub fn state(&self) -> SlotState {
    self.state
  }

  /// The source currently assigned to the element.
  pub fn current_source(&self) -> &str {
    &self.source
  }

  pub fn placeholder(&self) -> Option<&Placeholder> {
    self.placeholder.as_ref()
  }

  pub fn is_terminal(&self) -> bool {
    self.state == SlotState::Terminal
  }

  /// Handle a load failure of the current source.
  ///
  /// Returns `None` once the slot is terminal, whatever happens afterwards.
  pub fn on_load_error(&mut self, resolver: &Resolver) -> Option<SlotUpdate> {
    if self.is_terminal() {
      return None;
    }

    match resolver.resolve(self.kind, &self.reference, self.attempts, self.known_good.as_deref()) {
      NextAction::Retry(url) => {
        self.attempts = self.attempts.saturating_add(1);
        self.state = SlotState::Retrying(self.attempts);
        debug!(
          item_id = self.reference.item_id,
          slot = self.kind.label(),
          attempt = self.attempts,
          url = %url,
          "slot: retrying with fallback source"
        );
        self.source.clone_from(&url);
        Some(SlotUpdate::SetSource(url))
      }
      NextAction::Terminal(placeholder) => {
        warn!(
          item_id = self.reference.item_id,
          slot = self.kind.label(),
          attempts = self.attempts,
          original = %self.reference.original_url,
          "slot: no source loaded, showing placeholder"
        );
        self.state = SlotState::Terminal;
        self.source.clone_from(&placeholder.url);
        self.placeholder = Some(placeholder.clone());
        Some(SlotUpdate::Degrade(placeholder))
      }
    }
  }

  /// Fail every source in turn and collect the updates until the slot is terminal.
  pub fn exhaust(&mut self, resolver: &Resolver) -> Vec<SlotUpdate> {
    std::iter::from_fn(|| self.on_load_error(resolver)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn slot(kind: SlotKind, url: &str, known_good: Option<&str>) -> ImageSlot {
    ImageSlot::new(kind, ImageReference::new(url, 11), known_good.map(str::to_string))
  }

  // --- transitions ---

  #[test]
  fn new_slot_is_pending_on_original() {
    let s = slot(SlotKind::Grid, "https://cdn.example/a.jpg", None);
    assert_eq!(s.state(), SlotState::Pending);
    assert_eq!(s.current_source(), "https://cdn.example/a.jpg");
    assert_eq!(s.attempts(), 0);
  }

  #[test]
  fn failure_moves_to_retrying_then_terminal() {
    let resolver = Resolver::default();
    let mut s = slot(SlotKind::Grid, "http://cdn.example/a.jpg", None);

    assert_eq!(s.on_load_error(&resolver), Some(SlotUpdate::SetSource("https://cdn.example/a.jpg".into())));
    assert_eq!(s.state(), SlotState::Retrying(1));
    assert_eq!(s.current_source(), "https://cdn.example/a.jpg");

    let Some(SlotUpdate::Degrade(placeholder)) = s.on_load_error(&resolver) else { panic!("expected degrade") };
    assert_eq!(placeholder.url, "https://picsum.photos/800/600?random=11");
    assert!(s.is_terminal());
    assert_eq!(s.current_source(), placeholder.url);
    assert_eq!(s.placeholder(), Some(&placeholder));
  }

  #[test]
  fn terminal_slot_ignores_further_failures() {
    let resolver = Resolver::default();
    let mut s = slot(SlotKind::Modal, "", None);
    assert!(matches!(s.on_load_error(&resolver), Some(SlotUpdate::Degrade(_))));
    for _ in 0..10 {
      assert_eq!(s.on_load_error(&resolver), None);
    }
    assert!(s.is_terminal());
  }

  // --- bounds ---

  #[test]
  fn exhaust_stops_within_budget() {
    let resolver = Resolver::default();
    let cases = [
      (SlotKind::Grid, "http://commons.wikimedia.org/wiki/commons/a/ab/Moa.jpg"),
      (SlotKind::Modal, "http://commons.wikimedia.org/wiki/commons/a/ab/Moa.jpg"),
      (SlotKind::Modal, "not a url"),
    ];
    for (kind, url) in cases {
      let mut s = slot(kind, url, Some("https://cdn.example/moa.png"));
      let updates = s.exhaust(&resolver);
      let max = resolver.policy(kind).max_attempts as usize;
      assert!(updates.len() <= max + 1);
      assert!(matches!(updates.last(), Some(SlotUpdate::Degrade(_))));
      assert!(s.attempts() as usize <= max);
    }
  }

  #[test]
  fn modal_exhaust_visits_known_good_first() {
    let resolver = Resolver::default();
    let mut s = slot(SlotKind::Modal, "https://commons.wikimedia.org/wiki/commons/a/ab/Moa.jpg", Some("https://cdn.example/moa.png"));
    let updates = s.exhaust(&resolver);
    assert_eq!(updates.first(), Some(&SlotUpdate::SetSource("https://cdn.example/moa.png".into())));
    assert_eq!(updates.len(), 4);
  }

  #[test]
  fn slots_do_not_share_attempts() {
    let resolver = Resolver::default();
    let mut a = slot(SlotKind::Grid, "http://cdn.example/a.jpg", None);
    let b = slot(SlotKind::Grid, "http://cdn.example/b.jpg", None);
    a.on_load_error(&resolver);
    assert_eq!(a.attempts(), 1);
    assert_eq!(b.attempts(), 0);
  }
}
