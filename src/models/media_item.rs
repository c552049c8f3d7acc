use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a media item (a platform content reference).
///
/// Compared as a plain string; the only interpretation ever applied is
/// [`MediaUri::to_file_path`] for stores that hand out local files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaUri(String);

impl MediaUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves `file://` uris and absolute paths to a local path.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.0.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        let path = PathBuf::from(&self.0);
        path.is_absolute().then_some(path)
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaUri {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MediaUri {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The two collections a content store exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Images,
    Videos,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
        }
    }
}

/// Resolved duration of a video.
///
/// `Unknown` is the sentinel for a failed extraction and is never retried;
/// an unresolved duration is represented by the absence of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoDuration {
    Known(u64),
    Unknown,
}

impl VideoDuration {
    /// Duration in milliseconds, if known.
    pub fn millis(self) -> Option<u64> {
        match self {
            Self::Known(ms) => Some(ms),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRecord {
    Image {
        uri: MediaUri,
        timestamp: i64,
    },
    Video {
        uri: MediaUri,
        timestamp: i64,
        duration: Option<VideoDuration>,
    },
}

impl MediaRecord {
    pub fn image(uri: impl Into<MediaUri>, timestamp: i64) -> Self {
        Self::Image {
            uri: uri.into(),
            timestamp,
        }
    }

    pub fn video(uri: impl Into<MediaUri>, timestamp: i64, duration: Option<VideoDuration>) -> Self {
        Self::Video {
            uri: uri.into(),
            timestamp,
            duration,
        }
    }

    pub fn uri(&self) -> &MediaUri {
        match self {
            Self::Image { uri, .. } | Self::Video { uri, .. } => uri,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Image { timestamp, .. } | Self::Video { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video { .. })
    }

    /// Video duration; always `None` for images.
    pub fn duration(&self) -> Option<VideoDuration> {
        match self {
            Self::Image { .. } => None,
            Self::Video { duration, .. } => *duration,
        }
    }

    /// Fills in a missing duration. A resolved duration is never replaced.
    pub fn resolve_duration(&mut self, resolved: VideoDuration) -> bool {
        match self {
            Self::Video { duration, .. } if duration.is_none() => {
                *duration = Some(resolved);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_resolution() {
        assert_eq!(
            MediaUri::from("file:///tmp/a.mp4").to_file_path(),
            Some(PathBuf::from("/tmp/a.mp4"))
        );
        assert_eq!(
            MediaUri::from("/tmp/b.jpg").to_file_path(),
            Some(PathBuf::from("/tmp/b.jpg"))
        );
        assert_eq!(
            MediaUri::from("content://media/external/video/media/7").to_file_path(),
            None
        );
    }

    #[test]
    fn test_resolved_duration_is_never_replaced() {
        let mut video = MediaRecord::video("v", 1, None);
        assert!(video.resolve_duration(VideoDuration::Unknown));
        assert!(!video.resolve_duration(VideoDuration::Known(5_000)));
        assert_eq!(video.duration(), Some(VideoDuration::Unknown));

        let mut image = MediaRecord::image("i", 1);
        assert!(!image.resolve_duration(VideoDuration::Known(1)));
        assert_eq!(image.duration(), None);
    }
}
