use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Media families that are surfaced as data URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Extension (lowercase, no dot) -> (family, MIME type).
static MEDIA: Lazy<HashMap<&'static str, (MediaKind, &'static str)>> = Lazy::new(|| {
    use MediaKind::*;
    HashMap::from([
        ("png", (Image, "image/png")),
        ("jpg", (Image, "image/jpeg")),
        ("jpeg", (Image, "image/jpeg")),
        ("gif", (Image, "image/gif")),
        ("webp", (Image, "image/webp")),
        ("mp3", (Audio, "audio/mpeg")),
        ("wav", (Audio, "audio/wav")),
        ("ogg", (Audio, "audio/ogg")),
        ("flac", (Audio, "audio/flac")),
        ("aac", (Audio, "audio/aac")),
        ("m4a", (Audio, "audio/m4a")),
        ("mp4", (Video, "video/mp4")),
        ("webm", (Video, "video/webm")),
        ("mov", (Video, "video/mov")),
    ])
});

pub fn media_for_ext(ext: &str) -> Option<(MediaKind, &'static str)> {
    MEDIA.get(ext.to_ascii_lowercase().as_str()).copied()
}
