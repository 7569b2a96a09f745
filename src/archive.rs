//! The archive item list (`archive-items.json`) and the image slots derived from it.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::constants::constants;
use crate::fallback::{ImageReference, ItemId, SlotKind};
use crate::slot::ImageSlot;

/// Extra content shown when an item is opened.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalContent {
  pub title: Option<String>,
  #[serde(default)]
  pub images: Vec<String>,
  pub description: Option<String>,
  pub details: Option<String>,
  pub reflection_prompt: Option<String>,
}

/// A single archive entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveItem {
  pub id: ItemId,
  pub name: Option<String>,
  pub habitat: Option<String>,
  pub extinct_date: Option<String>,
  pub image: Option<String>,
  pub text: Option<String>,
  pub modal_content: Option<ModalContent>,
}

/// Treat `None` and empty strings alike.
fn non_empty(s: &Option<String>) -> Option<&str> {
  s.as_deref().filter(|s| !s.is_empty())
}

impl ArchiveItem {
  pub fn display_name(&self) -> &str {
    non_empty(&self.name).unwrap_or("Unknown Species")
  }

  pub fn display_habitat(&self) -> &str {
    non_empty(&self.habitat).unwrap_or("Unknown Habitat")
  }

  pub fn display_extinct_date(&self) -> &str {
    non_empty(&self.extinct_date).unwrap_or("Unknown")
  }

  /// Modal heading: explicit title, then name.
  pub fn modal_title(&self) -> &str {
    self.modal_content.as_ref().and_then(|m| non_empty(&m.title)).unwrap_or_else(|| self.display_name())
  }

  /// Source the grid thumbnail is mounted with.
  pub fn grid_source(&self) -> &str {
    non_empty(&self.image).unwrap_or(constants().default_grid_image.as_str())
  }

  /// Sources of the modal images: the gallery if there is one, else the main image.
  pub fn modal_sources(&self) -> Vec<&str> {
    let gallery: Vec<&str> =
      self.modal_content.iter().flat_map(|m| m.images.iter()).map(String::as_str).filter(|s| !s.is_empty()).collect();
    if !gallery.is_empty() {
      return gallery;
    }
    non_empty(&self.image).into_iter().collect()
  }

  pub fn grid_slot(&self) -> ImageSlot {
    ImageSlot::new(SlotKind::Grid, ImageReference::new(self.grid_source(), self.id), None)
  }

  /// One slot per modal image. The item's main image is the known-good source for all of them.
  pub fn modal_slots(&self) -> Vec<ImageSlot> {
    let known_good = non_empty(&self.image).map(str::to_string);
    self
      .modal_sources()
      .into_iter()
      .map(|src| ImageSlot::new(SlotKind::Modal, ImageReference::new(src, self.id), known_good.clone()))
      .collect()
  }

  /// Grid slot followed by the modal slots.
  pub fn slots(&self) -> Vec<ImageSlot> {
    let mut slots = vec![self.grid_slot()];
    slots.extend(self.modal_slots());
    slots
  }
}

#[derive(Debug, Deserialize)]
struct RawArchive {
  items: Option<serde_json::Value>,
}

/// The full item list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Archive {
  items: Vec<ArchiveItem>,
}

impl Archive {
  pub fn from_json(json: &str) -> Result<Self> {
    let raw: RawArchive = serde_json::from_str(json).context("archive is not valid JSON")?;
    let items = match raw.items {
      Some(value @ serde_json::Value::Array(_)) => {
        serde_json::from_value::<Vec<ArchiveItem>>(value).context("malformed archive item")?
      }
      _ => return Err(anyhow!("invalid data structure: items array not found")),
    };
    Ok(Self { items })
  }

  pub fn load(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read archive {}", path.display()))?;
    let archive = Self::from_json(&content).with_context(|| format!("Failed to parse archive {}", path.display()))?;
    info!(path = %path.display(), items = archive.items.len(), "archive: loaded");
    Ok(archive)
  }

  pub fn items(&self) -> &[ArchiveItem] {
    &self.items
  }

  pub fn item_by_id(&self, id: ItemId) -> Option<&ArchiveItem> {
    self.items.iter().find(|item| item.id == id)
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Every image slot the site would mount for this archive.
  pub fn slots(&self) -> Vec<ImageSlot> {
    self.items.iter().flat_map(ArchiveItem::slots).collect()
  }
}
