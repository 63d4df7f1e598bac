//! Best-effort codec and stream-type detection.
//!
//! Detection is a pure function of what the document says about an element:
//! its resolved source URL and the `src`/`type` strings of its child sources.
//! Nothing is decoded. When no explicit codec string matches, the URL's
//! extension may still yield codecs marked as [`inferred`](crate::Codec::inferred).

mod catalog;

use crate::host::MediaDescriptor;
use crate::state::Codec;

use catalog::{AUDIO_CODECS, CONTAINER_GUESSES, STREAM_TYPES, VIDEO_CODECS};

/// What detection found for one media element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Codecs, unique by label, in match order.
    pub codecs: Vec<Codec>,
    /// The first stream type matched, if any.
    pub stream_type: Option<&'static str>,
}

impl Detection {
    fn push_unique(&mut self, codec: Codec) {
        if !self.codecs.iter().any(|c| c.label == codec.label) {
            self.codecs.push(codec);
        }
    }
}

/// Runs detection over an element's descriptor.
///
/// # Example
///
/// ```
/// use page_audio::{detect, MediaDescriptor, MediaKind};
///
/// let desc = MediaDescriptor::new(MediaKind::Audio, Some("track.mp3".into()));
/// let found = detect(&desc);
/// assert_eq!(found.stream_type, Some("MP3"));
/// assert_eq!(found.codecs[0].label, "MP3");
/// ```
pub fn detect(descriptor: &MediaDescriptor) -> Detection {
    let urls: Vec<String> = descriptor
        .current_src
        .iter()
        .chain(descriptor.sources.iter().filter_map(|s| s.src.as_ref()))
        .map(|s| s.to_ascii_lowercase())
        .collect();
    let mimes: Vec<String> = descriptor
        .sources
        .iter()
        .filter_map(|s| s.mime.as_ref())
        .map(|s| s.to_ascii_lowercase())
        .collect();

    let mut detection = Detection::default();

    for text in urls.iter().chain(&mimes).filter(|s| !s.is_empty()) {
        for pattern in VIDEO_CODECS.iter().chain(AUDIO_CODECS) {
            if pattern.matches(text) {
                detection.push_unique(Codec::new(pattern.kind, pattern.label));
            }
        }
        if detection.stream_type.is_none() {
            detection.stream_type = STREAM_TYPES
                .iter()
                .find(|p| p.matches(text))
                .map(|p| p.label);
        }
    }

    if detection.codecs.is_empty() {
        for ext in urls.iter().filter_map(|u| extension(u)) {
            if let Some(guess) = CONTAINER_GUESSES.iter().find(|g| g.extension == ext) {
                for (kind, label) in guess.codecs {
                    detection.push_unique(Codec::inferred(*kind, *label));
                }
            }
        }
    }

    detection
}

/// Extracts the lowercase extension of a URL's last path segment.
fn extension(url: &str) -> Option<&str> {
    if url.starts_with("blob:") || url.starts_with("data:") {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = segment.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}
