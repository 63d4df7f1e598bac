//! The externally visible audio-state snapshot and broadcast deduplication.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::host::MediaKind;

/// Whether a codec carries audio or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// An audio codec.
    Audio,
    /// A video codec.
    Video,
}

/// A detected codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    /// Audio or video.
    pub kind: CodecKind,
    /// Display label (`"AAC"`, `"H.264"`, ...). Unique within a snapshot.
    pub label: String,
    /// `true` when guessed from a container extension rather than read
    /// from an explicit codec string.
    #[serde(default)]
    pub inferred: bool,
}

impl Codec {
    /// Creates an authoritative codec entry.
    pub fn new(kind: CodecKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            inferred: false,
        }
    }

    /// Creates an entry guessed from the container.
    pub fn inferred(kind: CodecKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            inferred: true,
        }
    }
}

/// Snapshot of everything audible on the page.
///
/// Always recomputed from scratch, never patched. Two snapshots are the same
/// when their [`signature`](AudioState::signature)s are equal.
///
/// # Example
///
/// ```
/// use page_audio::AudioState;
///
/// let state = AudioState::default();
/// assert!(!state.has_web_audio);
/// assert!(state.signature().contains("\"nativeAudioCount\":0"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioState {
    /// At least one live audio-graph context exists.
    pub has_web_audio: bool,
    /// At least one `<audio>` element is in the document.
    pub has_native_audio: bool,
    /// At least one `<video>` element is in the document.
    pub has_native_video: bool,
    /// Live audio-graph contexts, the engine's boost context included.
    pub web_audio_contexts: usize,
    /// Number of `<audio>` elements.
    pub native_audio_count: usize,
    /// Number of `<video>` elements.
    pub native_video_count: usize,
    /// Codecs seen across all media, unique by label, in discovery order.
    pub codecs: Vec<Codec>,
    /// The first stream type detected, if any.
    pub stream_type: Option<String>,
}

impl AudioState {
    /// Records the number of live graph contexts.
    pub(crate) fn set_contexts(&mut self, count: usize) {
        self.web_audio_contexts = count;
        self.has_web_audio = count > 0;
    }

    /// Folds one media element's kind and detection result into the snapshot.
    pub(crate) fn add_media(&mut self, kind: MediaKind, detection: &Detection) {
        match kind {
            MediaKind::Audio => {
                self.native_audio_count += 1;
                self.has_native_audio = true;
            }
            MediaKind::Video => {
                self.native_video_count += 1;
                self.has_native_video = true;
            }
        }
        for codec in &detection.codecs {
            self.merge_codec(codec);
        }
        if self.stream_type.is_none() {
            self.stream_type = detection.stream_type.map(str::to_string);
        }
    }

    fn merge_codec(&mut self, codec: &Codec) {
        if !self.codecs.iter().any(|c| c.label == codec.label) {
            self.codecs.push(codec.clone());
        }
    }

    /// Structural signature used for change detection.
    pub fn signature(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Remembers the last broadcast signature so unchanged snapshots are not resent.
#[derive(Debug, Default)]
pub(crate) struct StateTracker {
    last_signature: Option<String>,
}

impl StateTracker {
    /// Returns the signature to send, or `None` if the snapshot is a duplicate
    /// and the broadcast is not forced. Admitting records the signature.
    pub fn admit(&mut self, state: &AudioState, force: bool) -> Option<String> {
        let signature = state.signature();
        if !force && self.last_signature.as_deref() == Some(signature.as_str()) {
            return None;
        }
        self.last_signature = Some(signature.clone());
        Some(signature)
    }

    /// Forgets the last signature, e.g. after a failed delivery.
    pub fn invalidate(&mut self) {
        self.last_signature = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(codecs: Vec<Codec>, stream_type: Option<&'static str>) -> Detection {
        Detection {
            codecs,
            stream_type,
        }
    }

    #[test]
    fn test_add_media_counts() {
        let mut state = AudioState::default();
        state.add_media(MediaKind::Audio, &Detection::default());
        state.add_media(MediaKind::Audio, &Detection::default());
        state.add_media(MediaKind::Video, &Detection::default());

        assert_eq!(state.native_audio_count, 2);
        assert_eq!(state.native_video_count, 1);
        assert!(state.has_native_audio);
        assert!(state.has_native_video);
    }

    #[test]
    fn test_codecs_unique_by_label_first_stream_type_wins() {
        let mut state = AudioState::default();
        state.add_media(
            MediaKind::Video,
            &detection(
                vec![Codec::inferred(CodecKind::Audio, "AAC")],
                Some("MP4"),
            ),
        );
        state.add_media(
            MediaKind::Audio,
            &detection(vec![Codec::new(CodecKind::Audio, "AAC")], Some("HLS")),
        );

        assert_eq!(state.codecs.len(), 1);
        assert!(state.codecs[0].inferred);
        assert_eq!(state.stream_type.as_deref(), Some("MP4"));
    }

    #[test]
    fn test_set_contexts() {
        let mut state = AudioState::default();
        state.set_contexts(2);
        assert!(state.has_web_audio);
        state.set_contexts(0);
        assert!(!state.has_web_audio);
    }

    #[test]
    fn test_signature_is_camel_case_json() {
        let sig = AudioState::default().signature();
        assert!(sig.contains("\"hasWebAudio\":false"));
        assert!(sig.contains("\"streamType\":null"));
    }

    #[test]
    fn test_tracker_suppresses_duplicates() {
        let mut tracker = StateTracker::default();
        let state = AudioState::default();

        assert!(tracker.admit(&state, false).is_some());
        assert!(tracker.admit(&state, false).is_none());
        // Forced broadcasts always go out
        assert!(tracker.admit(&state, true).is_some());

        let mut changed = state.clone();
        changed.set_contexts(1);
        assert!(tracker.admit(&changed, false).is_some());
    }

    #[test]
    fn test_tracker_invalidate() {
        let mut tracker = StateTracker::default();
        let state = AudioState::default();
        tracker.admit(&state, false);
        tracker.invalidate();
        assert!(tracker.admit(&state, false).is_some());
    }

    #[test]
    fn test_state_deserializes_from_signature() {
        let mut state = AudioState::default();
        state.add_media(
            MediaKind::Audio,
            &detection(vec![Codec::new(CodecKind::Audio, "MP3")], Some("MP3")),
        );
        let parsed: AudioState = serde_json::from_str(&state.signature()).unwrap();
        assert_eq!(parsed, state);
    }
}
