//! Live-status extraction for streaming platforms.
//!
//! Only Chzzk is supported: [`extractor::platforms::chzzk::Chzzk`] queries the
//! channel live-detail endpoint and turns it into a [`media::MediaInfo`].

pub mod extractor;
pub mod media;
