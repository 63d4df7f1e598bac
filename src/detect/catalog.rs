//! Static pattern tables for codec and stream-type detection.
//!
//! All fragments are lowercase and matched as substrings of a lowercased
//! URL or MIME string. Tables are ordered; earlier entries win where order
//! matters (stream types).

use crate::state::CodecKind;

/// A codec recognized by substring fragments.
#[derive(Debug)]
pub struct CodecPattern {
    /// Display label, unique across both codec tables.
    pub label: &'static str,
    /// Audio or video.
    pub kind: CodecKind,
    /// Any of these fragments matches.
    pub fragments: &'static [&'static str],
    /// A match is void if any of these also appears.
    pub excludes: &'static [&'static str],
}

/// A stream/container type recognized by substring fragments.
#[derive(Debug)]
pub struct StreamPattern {
    /// Display label.
    pub label: &'static str,
    /// Any of these fragments matches.
    pub fragments: &'static [&'static str],
    /// A match is void if any of these also appears.
    pub excludes: &'static [&'static str],
}

/// Codecs guessed from a URL extension when nothing explicit matched.
#[derive(Debug)]
pub struct ContainerGuess {
    /// Lowercase extension without the dot.
    pub extension: &'static str,
    /// Codecs that container most commonly carries.
    pub codecs: &'static [(CodecKind, &'static str)],
}

/// Video codecs, most common first.
pub const VIDEO_CODECS: &[CodecPattern] = &[
    CodecPattern {
        label: "H.264",
        kind: CodecKind::Video,
        fragments: &["avc1", "avc3", "h264", "h.264"],
        excludes: &[],
    },
    CodecPattern {
        label: "H.265",
        kind: CodecKind::Video,
        fragments: &["hvc1", "hev1", "h265", "h.265", "hevc"],
        excludes: &[],
    },
    CodecPattern {
        label: "VP9",
        kind: CodecKind::Video,
        fragments: &["vp09", "vp9"],
        excludes: &[],
    },
    CodecPattern {
        label: "VP8",
        kind: CodecKind::Video,
        fragments: &["vp8"],
        excludes: &[],
    },
    CodecPattern {
        label: "AV1",
        kind: CodecKind::Video,
        fragments: &["av01", "av1"],
        excludes: &[],
    },
    CodecPattern {
        label: "Theora",
        kind: CodecKind::Video,
        fragments: &["theora"],
        excludes: &[],
    },
];

/// Audio codecs. Exclusions keep container names from reading as codecs.
pub const AUDIO_CODECS: &[CodecPattern] = &[
    CodecPattern {
        label: "AAC",
        kind: CodecKind::Audio,
        fragments: &["mp4a", "aac"],
        excludes: &[],
    },
    // "mp3" inside an mp4 type string is a container artifact, not the codec.
    CodecPattern {
        label: "MP3",
        kind: CodecKind::Audio,
        fragments: &["mp3", "mpeg3", "audio/mpeg"],
        excludes: &["mp4"],
    },
    CodecPattern {
        label: "Opus",
        kind: CodecKind::Audio,
        fragments: &["opus"],
        excludes: &[],
    },
    CodecPattern {
        label: "Vorbis",
        kind: CodecKind::Audio,
        fragments: &["vorbis"],
        excludes: &[],
    },
    CodecPattern {
        label: "FLAC",
        kind: CodecKind::Audio,
        fragments: &["flac"],
        excludes: &[],
    },
    CodecPattern {
        label: "E-AC-3",
        kind: CodecKind::Audio,
        fragments: &["ec-3", "eac3", "e-ac-3"],
        excludes: &[],
    },
    CodecPattern {
        label: "AC-3",
        kind: CodecKind::Audio,
        fragments: &["ac-3", "ac3"],
        excludes: &["ec-3", "eac3", "e-ac-3"],
    },
    CodecPattern {
        label: "PCM",
        kind: CodecKind::Audio,
        fragments: &["pcm", "wav"],
        excludes: &[],
    },
];

/// Stream/container types. The first match wins.
pub const STREAM_TYPES: &[StreamPattern] = &[
    StreamPattern {
        label: "HLS",
        fragments: &[".m3u8", "mpegurl"],
        excludes: &[],
    },
    StreamPattern {
        label: "DASH",
        fragments: &[".mpd", "dash+xml"],
        excludes: &[],
    },
    StreamPattern {
        label: "MSE",
        fragments: &["blob:", "mediasource"],
        excludes: &[],
    },
    StreamPattern {
        label: "WebM",
        fragments: &["webm"],
        excludes: &[],
    },
    StreamPattern {
        label: "MP4",
        fragments: &["mp4", ".m4a", ".m4v"],
        excludes: &[],
    },
    StreamPattern {
        label: "MP3",
        fragments: &["mp3", "audio/mpeg"],
        excludes: &["mp4"],
    },
    StreamPattern {
        label: "Ogg",
        fragments: &["ogg", ".oga", ".ogv"],
        excludes: &[],
    },
    StreamPattern {
        label: "WAV",
        fragments: &["wav"],
        excludes: &[],
    },
    StreamPattern {
        label: "FLAC",
        fragments: &["flac"],
        excludes: &[],
    },
];

/// Extension-based guesses, used only when no explicit codec matched.
pub const CONTAINER_GUESSES: &[ContainerGuess] = &[
    ContainerGuess {
        extension: "mp4",
        codecs: &[(CodecKind::Video, "H.264"), (CodecKind::Audio, "AAC")],
    },
    ContainerGuess {
        extension: "m4v",
        codecs: &[(CodecKind::Video, "H.264"), (CodecKind::Audio, "AAC")],
    },
    ContainerGuess {
        extension: "m4a",
        codecs: &[(CodecKind::Audio, "AAC")],
    },
    ContainerGuess {
        extension: "webm",
        codecs: &[(CodecKind::Video, "VP9"), (CodecKind::Audio, "Opus")],
    },
    ContainerGuess {
        extension: "mp3",
        codecs: &[(CodecKind::Audio, "MP3")],
    },
    ContainerGuess {
        extension: "m3u8",
        codecs: &[(CodecKind::Video, "H.264"), (CodecKind::Audio, "AAC")],
    },
    ContainerGuess {
        extension: "mpd",
        codecs: &[(CodecKind::Video, "H.264"), (CodecKind::Audio, "AAC")],
    },
    ContainerGuess {
        extension: "ogg",
        codecs: &[(CodecKind::Audio, "Vorbis")],
    },
    ContainerGuess {
        extension: "ogv",
        codecs: &[(CodecKind::Video, "Theora"), (CodecKind::Audio, "Vorbis")],
    },
    ContainerGuess {
        extension: "flac",
        codecs: &[(CodecKind::Audio, "FLAC")],
    },
];

fn fragment_match(haystack: &str, fragments: &[&str], excludes: &[&str]) -> bool {
    fragments.iter().any(|f| haystack.contains(f)) && !excludes.iter().any(|x| haystack.contains(x))
}

impl CodecPattern {
    /// Returns `true` if the lowercased string matches and no exclusion fires.
    pub fn matches(&self, lowered: &str) -> bool {
        fragment_match(lowered, self.fragments, self.excludes)
    }
}

impl StreamPattern {
    /// Returns `true` if the lowercased string matches and no exclusion fires.
    pub fn matches(&self, lowered: &str) -> bool {
        fragment_match(lowered, self.fragments, self.excludes)
    }
}
