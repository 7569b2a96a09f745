//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Media repository
  pub repository_host_pattern: String,
  pub repository_path_marker: String,
  pub repository_upload_base: String,
  pub thumbnail_width: u32,
  pub image_extensions: Vec<String>,

  // Attempt budgets
  pub grid_max_attempts: u32,
  pub modal_max_attempts: u32,

  // Placeholders
  pub placeholder_svg: String,
  pub placeholder_alt: String,
  pub modal_placeholder_opacity: f32,
  pub stand_in_url_base: String,
  pub grid_placeholder_opacity: f32,

  // Archive
  pub default_grid_image: String,

  // Audit
  pub audit_concurrency: usize,
  pub audit_timeout_secs: u64,
  pub audit_user_agent: String,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
