//! Failure kinds inside the fallback chain.
//!
//! None of these leave the chain: a `ParseFailure` or `UnknownHost` makes a
//! single rule inapplicable, and `ExhaustedAttempts` becomes a terminal
//! placeholder.

/// Reasons a fallback rule could not produce a candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
  /// The URL did not have the shape the rule expects
  #[error("cannot derive a source from '{url}': {reason}")]
  ParseFailure { url: String, reason: &'static str },

  /// The attempt budget is spent
  #[error("gave up after {attempts} attempts")]
  ExhaustedAttempts { attempts: u32 },

  /// The URL is not hosted by the known media repository
  #[error("not a media repository URL: '{0}'")]
  UnknownHost(String),
}

impl ResolveError {
  pub fn parse(url: impl Into<String>, reason: &'static str) -> Self {
    Self::ParseFailure { url: url.into(), reason }
  }
}
