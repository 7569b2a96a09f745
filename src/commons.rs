//! URL heuristics for the known media repository (Wikimedia Commons).
//!
//! Archive items frequently point at Commons description pages or at
//! mirrors of them. Everything here is string rewriting: nothing is fetched
//! and nothing is cached.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::constants::constants;
use crate::error::ResolveError;

/// Characters left untouched by URI-component encoding.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'!')
  .remove(b'~')
  .remove(b'*')
  .remove(b'\'')
  .remove(b'(')
  .remove(b')');

/// Whether `url` belongs to the media repository (host substring match).
pub fn is_repository_url(url: &str) -> bool {
  url.contains(constants().repository_host_pattern.as_str())
}

/// Extract everything after the first `/commons/` marker.
pub fn commons_path(url: &str) -> Result<&str, ResolveError> {
  if !is_repository_url(url) {
    return Err(ResolveError::UnknownHost(url.to_string()));
  }
  let marker = constants().repository_path_marker.as_str();
  let start = url.find(marker).ok_or_else(|| ResolveError::parse(url, "no commons path segment"))? + marker.len();
  let path = &url[start..];
  if path.is_empty() {
    return Err(ResolveError::parse(url, "empty commons path"));
  }
  if path.contains(['\n', '\r']) {
    return Err(ResolveError::parse(url, "line break in commons path"));
  }
  Ok(path)
}

/// Canonical direct-file endpoint for a commons path.
pub fn direct_file_url(path: &str) -> String {
  format!("{}{}", constants().repository_upload_base, path)
}

/// Thumbnail-endpoint URL for a commons path ending in an image filename.
///
/// The repository shards files by the MD5 of the filename; this uses the first
/// one or two characters of the name instead, so the result is a guess that
/// only sometimes resolves.
pub fn thumbnail_url(path: &str) -> Result<String, ResolveError> {
  let (_, raw_name) = path.rsplit_once('/').ok_or_else(|| ResolveError::parse(path, "no directory before filename"))?;
  let (stem, ext) = raw_name.rsplit_once('.').ok_or_else(|| ResolveError::parse(path, "filename has no extension"))?;
  if stem.is_empty() {
    return Err(ResolveError::parse(path, "empty filename"));
  }
  let ext = ext.to_ascii_lowercase();
  if !constants().image_extensions.iter().any(|known| *known == ext) {
    return Err(ResolveError::parse(path, "not an image extension"));
  }

  let filename = decode_component(raw_name).ok_or_else(|| ResolveError::parse(path, "malformed percent-encoding"))?;
  // A non-empty stem plus `.ext` means at least two characters; the second may be the dot.
  let mut chars = filename.chars().map(|c| c.to_lowercase().collect::<String>());
  let first = chars.next().unwrap_or_default();
  let second = chars.next().unwrap_or_default();
  let encoded = utf8_percent_encode(&filename, URI_COMPONENT).to_string();

  Ok(format!(
    "{base}thumb/{first}/{first}{second}/{encoded}/{width}px-{encoded}",
    base = constants().repository_upload_base,
    width = constants().thumbnail_width,
  ))
}

/// Rewrite a leading `http:` scheme to `https:`.
pub fn force_secure(url: &str) -> Option<String> {
  url.strip_prefix("http:").map(|rest| format!("https:{rest}"))
}

/// Strict URI-component decoding: every `%` must start a two-digit hex escape
/// and the decoded bytes must be UTF-8.
fn decode_component(s: &str) -> Option<String> {
  let bytes = s.as_bytes();
  let well_formed = bytes
    .iter()
    .enumerate()
    .filter(|(_, b)| **b == b'%')
    .all(|(i, _)| bytes.get(i + 1..i + 3).is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)));
  if !well_formed {
    return None;
  }
  percent_decode_str(s).decode_utf8().ok().map(|decoded| decoded.into_owned())
}
