//! Image source fallback for the archive site.
//!
//! [`fallback`] holds the chain that picks the next source for an image that
//! failed to load, [`slot`] tracks one image's attempts, and [`archive`]
//! derives slots from the site's item list. [`probe`] replays the chain
//! against the network.

pub mod archive;
pub mod commons;
pub mod config;
pub mod constants;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod probe;
pub mod report;
pub mod slot;
