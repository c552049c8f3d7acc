use super::{MediaRecord, MediaUri, VideoDuration};

/// Shown in place of a video duration that is pending or could not be read.
pub const DURATION_PLACEHOLDER: &str = "\u{2026}";

/// A renderable grid/pager cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    Image {
        uri: MediaUri,
        selection_number: Option<usize>,
    },
    Video {
        uri: MediaUri,
        duration: String,
        selection_number: Option<usize>,
    },
}

impl ViewItem {
    /// Projects a record, given its 1-based position in the selection.
    pub fn from_record(record: &MediaRecord, selection_number: Option<usize>) -> Self {
        match record {
            MediaRecord::Image { uri, .. } => Self::Image {
                uri: uri.clone(),
                selection_number,
            },
            MediaRecord::Video { uri, duration, .. } => Self::Video {
                uri: uri.clone(),
                duration: format_duration(*duration),
                selection_number,
            },
        }
    }

    pub fn uri(&self) -> &MediaUri {
        match self {
            Self::Image { uri, .. } | Self::Video { uri, .. } => uri,
        }
    }

    pub fn selection_number(&self) -> Option<usize> {
        match self {
            Self::Image {
                selection_number, ..
            }
            | Self::Video {
                selection_number, ..
            } => *selection_number,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selection_number().is_some()
    }
}

/// Formats a duration as zero-padded `mm:ss`.
///
/// Hours are folded into the minutes field. Pending and unknown durations
/// render as [`DURATION_PLACEHOLDER`].
pub fn format_duration(duration: Option<VideoDuration>) -> String {
    match duration.and_then(VideoDuration::millis) {
        Some(ms) => {
            let total_seconds = ms / 1000;
            format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
        }
        None => DURATION_PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(VideoDuration::Known(0))), "00:00");
        assert_eq!(format_duration(Some(VideoDuration::Known(61_999))), "01:01");
        assert_eq!(format_duration(Some(VideoDuration::Known(3_725_000))), "62:05");
        assert_eq!(format_duration(Some(VideoDuration::Unknown)), DURATION_PLACEHOLDER);
        assert_eq!(format_duration(None), DURATION_PLACEHOLDER);
    }

    #[test]
    fn test_from_record_carries_selection_number() {
        let item = ViewItem::from_record(&MediaRecord::video("v", 3, None), Some(2));
        assert_eq!(item.selection_number(), Some(2));
        assert!(matches!(item, ViewItem::Video { ref duration, .. } if duration == DURATION_PLACEHOLDER));

        let item = ViewItem::from_record(&MediaRecord::image("i", 3), None);
        assert!(!item.is_selected());
        assert_eq!(item.uri().as_str(), "i");
    }
}
