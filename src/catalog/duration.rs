//! Video duration resolution for stores without a duration column.
//!
//! - `DurationCache`: bounded in-process LRU keyed by file identity
//! - `ContainerDurationExtractor`: reads the duration header of MP4/MOV and
//!   Matroska/WebM files, touching only the head and tail of the file
//!
//! A key includes size and timestamps, so a replaced file misses the cache
//! instead of returning a stale value.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::DurationError;
use crate::models::{MediaUri, VideoDuration};

/// Bytes inspected at each end of a container file.
const SCAN_WINDOW: u64 = 128 * 1024;

/// Default Matroska timecode scale (1ms in nanoseconds).
const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Identity of a video file as the store describes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DurationCacheKey {
    pub uri: MediaUri,
    pub byte_size: i64,
    pub create_time: i64,
    pub modify_time: i64,
}

/// Bounded lookup of resolved durations, shared between reloads.
///
/// Entries are only ever inserted or overwritten.
#[derive(Clone)]
pub struct DurationCache {
    entries: Arc<Mutex<LruCache<DurationCacheKey, VideoDuration>>>,
}

impl DurationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn get(&self, key: &DurationCacheKey) -> Option<VideoDuration> {
        self.entries.lock().get(key).copied()
    }

    pub fn insert(&self, key: DurationCacheKey, duration: VideoDuration) {
        self.entries.lock().put(key, duration);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads a video's duration by inspecting the file.
pub trait DurationExtractor: Send + Sync {
    /// Duration in milliseconds.
    fn extract(&self, uri: &MediaUri) -> Result<u64, DurationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Mp4,
    Matroska,
}

impl Container {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "mp4" | "m4v" | "mov" | "3gp" => Some(Self::Mp4),
            "mkv" | "webm" => Some(Self::Matroska),
            _ => None,
        }
    }
}

/// Header-only duration reader for local files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerDurationExtractor;

impl DurationExtractor for ContainerDurationExtractor {
    fn extract(&self, uri: &MediaUri) -> Result<u64, DurationError> {
        let path = uri
            .to_file_path()
            .ok_or_else(|| DurationError::NotLocal { uri: uri.clone() })?;
        let container =
            Container::from_path(&path).ok_or_else(|| DurationError::UnsupportedContainer {
                path: path.clone(),
            })?;

        trace!(?path, ?container, "Extracting video duration");
        let io_err = |source| DurationError::Io {
            path: path.clone(),
            source,
        };
        let windows = read_windows(&path).map_err(io_err)?;

        let duration = windows.iter().find_map(|window| match container {
            Container::Mp4 => parse_mvhd_duration(window),
            Container::Matroska => parse_matroska_duration(window),
        });

        match duration {
            Some(ms) => {
                debug!(?path, ms, "Extracted video duration");
                Ok(ms)
            }
            None => Err(DurationError::MissingHeader { path }),
        }
    }
}

/// Reads the head of the file and, for large files, its tail too; MP4s
/// written without fast-start keep `moov` at the end.
fn read_windows(path: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut head = Vec::with_capacity(SCAN_WINDOW.min(len) as usize);
    (&mut file).take(SCAN_WINDOW).read_to_end(&mut head)?;

    let mut windows = vec![head];
    if len > SCAN_WINDOW {
        let start = len.saturating_sub(SCAN_WINDOW).max(SCAN_WINDOW);
        file.seek(SeekFrom::Start(start))?;
        let mut tail = Vec::new();
        file.take(SCAN_WINDOW).read_to_end(&mut tail)?;
        windows.push(tail);
    }
    Ok(windows)
}

fn be_u32(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn be_u64(buf: &[u8], at: usize) -> Option<u64> {
    let bytes = buf.get(at..at + 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_be_bytes(raw))
}

/// Finds the movie header (`mvhd`) and converts its duration to ms.
///
/// Layout after the tag: version(1) flags(3), then for v0 four u32 fields
/// (ctime, mtime, timescale, duration), for v1 u64 times and duration.
fn parse_mvhd_duration(buf: &[u8]) -> Option<u64> {
    let mut from = 0;
    while let Some(pos) = find(&buf[from..], b"mvhd") {
        let i = from + pos;
        let parsed = match buf.get(i + 4)? {
            0 => be_u32(buf, i + 16)
                .zip(be_u32(buf, i + 20))
                .map(|(scale, dur)| (scale as u64, dur as u64)),
            1 => be_u32(buf, i + 24)
                .zip(be_u64(buf, i + 28))
                .map(|(scale, dur)| (scale as u64, dur)),
            _ => None,
        };
        if let Some((timescale, duration)) = parsed {
            if timescale > 0 {
                return Some(duration.saturating_mul(1000) / timescale);
            }
        }
        from = i + 4;
    }
    None
}

/// Finds the segment `Duration` (0x4489, float in timecode units) and the
/// optional `TimecodeScale` (0x2AD7B1, ns per unit).
fn parse_matroska_duration(buf: &[u8]) -> Option<u64> {
    let scale = find(buf, &[0x2A, 0xD7, 0xB1])
        .and_then(|i| read_element(buf, i + 3))
        .map(|payload| payload.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
        .filter(|scale| *scale > 0)
        .unwrap_or(DEFAULT_TIMECODE_SCALE);

    let payload = find(buf, &[0x44, 0x89]).and_then(|i| read_element(buf, i + 2))?;
    let units = match payload.len() {
        4 => f32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as f64,
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            f64::from_be_bytes(raw)
        }
        _ => return None,
    };
    if !units.is_finite() || units < 0.0 {
        return None;
    }
    Some((units * scale as f64 / 1_000_000.0) as u64)
}

/// Reads a one-byte EBML size descriptor at `at` and returns the payload.
fn read_element(buf: &[u8], at: usize) -> Option<&[u8]> {
    let size_byte = *buf.get(at)?;
    if size_byte & 0x80 == 0 {
        return None;
    }
    let len = (size_byte & 0x7F) as usize;
    buf.get(at + 1..at + 1 + len)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&108u32.to_be_bytes());
        data.extend_from_slice(b"mvhd");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&timescale.to_be_bytes());
        data.extend_from_slice(&duration.to_be_bytes());
        data.extend_from_slice(&[0u8; 80]);
        data
    }

    #[test]
    fn test_mvhd_v0() {
        let mut buf = b"....ftypisom".to_vec();
        buf.extend(mvhd_v0(600, 3_000));
        assert_eq!(parse_mvhd_duration(&buf), Some(5_000));
    }

    #[test]
    fn test_mvhd_missing() {
        assert_eq!(parse_mvhd_duration(b"nothing to see here"), None);
    }

    #[test]
    fn test_matroska_duration_with_default_scale() {
        let mut buf = vec![0x1A, 0x45, 0xDF, 0xA3];
        buf.extend_from_slice(&[0x44, 0x89, 0x84]);
        buf.extend_from_slice(&2_500.0f32.to_be_bytes());
        assert_eq!(parse_matroska_duration(&buf), Some(2_500));
    }

    #[test]
    fn test_matroska_duration_with_scale() {
        let mut buf = vec![0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40];
        buf.extend_from_slice(&[0x44, 0x89, 0x88]);
        buf.extend_from_slice(&1_500.0f64.to_be_bytes());
        assert_eq!(parse_matroska_duration(&buf), Some(1_500));
    }

    #[test]
    fn test_extract_from_file() {
        let mut file = NamedTempFile::with_suffix(".mp4").unwrap();
        file.write_all(&mvhd_v0(1_000, 61_000)).unwrap();
        let uri = MediaUri::new(file.path().to_string_lossy().to_string());

        let ms = ContainerDurationExtractor.extract(&uri).unwrap();
        assert_eq!(ms, 61_000);
    }

    #[test]
    fn test_extract_failures() {
        let extractor = ContainerDurationExtractor;
        assert!(matches!(
            extractor.extract(&MediaUri::from("content://media/1")),
            Err(DurationError::NotLocal { .. })
        ));
        assert!(matches!(
            extractor.extract(&MediaUri::from("/tmp/clip.xyz")),
            Err(DurationError::UnsupportedContainer { .. })
        ));

        let mut file = NamedTempFile::with_suffix(".webm").unwrap();
        file.write_all(b"not a real container").unwrap();
        let uri = MediaUri::new(file.path().to_string_lossy().to_string());
        assert!(matches!(
            extractor.extract(&uri),
            Err(DurationError::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_cache_misses_on_changed_file() {
        let cache = DurationCache::new(4);
        let key = DurationCacheKey {
            uri: MediaUri::from("/v.mp4"),
            byte_size: 10,
            create_time: 1,
            modify_time: 2,
        };
        cache.insert(key.clone(), VideoDuration::Known(900));
        assert_eq!(cache.get(&key), Some(VideoDuration::Known(900)));

        let replaced = DurationCacheKey {
            byte_size: 11,
            ..key
        };
        assert_eq!(cache.get(&replaced), None);
    }

    #[test]
    fn test_cache_is_bounded() {
        let cache = DurationCache::new(2);
        for i in 0..5 {
            cache.insert(
                DurationCacheKey {
                    uri: MediaUri::new(format!("/v{i}.mp4")),
                    byte_size: i,
                    create_time: i,
                    modify_time: i,
                },
                VideoDuration::Unknown,
            );
        }
        assert_eq!(cache.len(), 2);
    }
}
