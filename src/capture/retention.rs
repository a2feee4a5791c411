//! Bounded on-disk history of captured frames.
//!
//! Layout: `frame-<millis>.png` per frame plus `latest.png`. The number of
//! `frame-*.png` files never exceeds the retain count once `prepare` ran.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::telemetry::CapturedFrame;

const FRAME_PREFIX: &str = "frame-";
const FRAME_SUFFIX: &str = ".png";
pub const LATEST_FILE: &str = "latest.png";

/// Timestamp encoded in a `frame-<millis>.png` name.
pub fn parse_frame_name(name: &str) -> Option<u64> {
    name.strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_SUFFIX)?
        .parse()
        .ok()
}

pub struct FrameStore {
    dir: PathBuf,
    retain: usize,
    history: VecDeque<(u64, PathBuf)>,
    last_timestamp: u64,
}

impl FrameStore {
    pub fn new(dir: impl Into<PathBuf>, retain: usize) -> Self {
        Self {
            dir: dir.into(),
            retain: retain.max(1),
            history: VecDeque::new(),
            last_timestamp: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retain(&self) -> usize {
        self.retain
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    /// Retained frame files, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Path> {
        self.history.iter().map(|(_, path)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Create the directory and adopt frames left by an earlier run.
    pub fn prepare(&mut self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(ts) = name.to_str().and_then(parse_frame_name) {
                found.push((ts, entry.path()));
            }
        }
        found.sort();

        self.last_timestamp = found.last().map(|(ts, _)| *ts).unwrap_or(0);
        self.history = found.into();
        if !self.history.is_empty() {
            debug!(
                "Adopted {} frames from {}",
                self.history.len(),
                self.dir.display()
            );
        }
        self.trim();
        Ok(())
    }

    /// Write one frame, trim the history, then update `latest.png`.
    ///
    /// `now_ms` is bumped when needed so timestamps strictly increase. A
    /// frame file that made it to disk is always tracked, even when updating
    /// `latest.png` fails afterwards.
    pub fn persist(&mut self, png: Vec<u8>, now_ms: u64) -> io::Result<CapturedFrame> {
        let timestamp = now_ms.max(self.last_timestamp + 1);
        let path = self
            .dir
            .join(format!("{}{}{}", FRAME_PREFIX, timestamp, FRAME_SUFFIX));

        write_atomic(&path, &png)?;
        self.last_timestamp = timestamp;
        self.history.push_back((timestamp, path.clone()));
        self.trim();

        write_atomic(&self.latest_path(), &png)?;

        Ok(CapturedFrame {
            png,
            captured_at: timestamp,
            file_path: Some(path),
        })
    }

    /// Remove the oldest frames beyond the retain count. Frames that cannot
    /// be removed stay in the history and are retried on the next trim.
    fn trim(&mut self) {
        let mut stuck = Vec::new();
        while self.history.len() + stuck.len() > self.retain {
            let Some((ts, oldest)) = self.history.pop_front() else {
                break;
            };
            match std::fs::remove_file(&oldest) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", oldest.display(), e);
                    stuck.push((ts, oldest));
                }
            }
        }
        for entry in stuck.into_iter().rev() {
            self.history.push_front(entry);
        }
    }
}

/// Write through a temporary sibling and rename, so readers never see a
/// partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frame_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| parse_frame_name(n).is_some())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_parse_frame_name() {
        assert_eq!(parse_frame_name("frame-1700000000000.png"), Some(1_700_000_000_000));
        assert_eq!(parse_frame_name("latest.png"), None);
        assert_eq!(parse_frame_name("frame-abc.png"), None);
        assert_eq!(parse_frame_name("frame-12.png.tmp"), None);
    }

    #[test]
    fn test_persist_writes_frame_and_latest() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::new(dir.path(), 3);
        store.prepare().unwrap();

        let frame = store.persist(vec![1, 2, 3], 1000).unwrap();
        assert_eq!(frame.captured_at, 1000);
        let path = frame.file_path.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(std::fs::read(store.latest_path()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::new(dir.path(), 10);
        store.prepare().unwrap();

        let a = store.persist(vec![0], 500).unwrap();
        let b = store.persist(vec![0], 500).unwrap();
        let c = store.persist(vec![0], 400).unwrap();
        assert_eq!((a.captured_at, b.captured_at, c.captured_at), (500, 501, 502));
        assert_eq!(frame_files(dir.path()).len(), 3);
    }

    #[test]
    fn test_trims_oldest_first() {
        let dir = TempDir::new().unwrap();
        let mut store = FrameStore::new(dir.path(), 2);
        store.prepare().unwrap();
        for ts in [10, 20, 30, 40] {
            store.persist(vec![ts as u8], ts).unwrap();
        }
        assert_eq!(
            frame_files(dir.path()),
            vec!["frame-30.png".to_string(), "frame-40.png".to_string()]
        );
        assert_eq!(std::fs::read(store.latest_path()).unwrap(), vec![40]);
    }

    #[test]
    fn test_prepare_adopts_existing_frames() {
        let dir = TempDir::new().unwrap();
        for ts in [5, 1, 3, 2, 4] {
            std::fs::write(dir.path().join(format!("frame-{}.png", ts)), b"old").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let mut store = FrameStore::new(dir.path(), 3);
        store.prepare().unwrap();
        assert_eq!(
            frame_files(dir.path()),
            vec!["frame-3.png", "frame-4.png", "frame-5.png"]
        );
        assert!(dir.path().join("notes.txt").exists());

        // New frames continue after the adopted ones
        let frame = store.persist(vec![9], 0).unwrap();
        assert_eq!(frame.captured_at, 6);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_latest_failure_keeps_frames_tracked() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory where latest.png should go makes the rename fail
        let latest = dir.path().join(LATEST_FILE);
        std::fs::create_dir(&latest).unwrap();
        std::fs::write(latest.join("blocker"), b"x").unwrap();

        let mut store = FrameStore::new(dir.path(), 2);
        store.prepare().unwrap();
        for ts in [10, 20, 30, 40] {
            assert!(store.persist(vec![ts as u8], ts).is_err());
        }

        assert_eq!(frame_files(dir.path()), vec!["frame-30.png", "frame-40.png"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failed_removal_is_retried() {
        let dir = TempDir::new().unwrap();
        // remove_file cannot delete a directory
        let stubborn = dir.path().join("frame-5.png");
        std::fs::create_dir(&stubborn).unwrap();
        std::fs::write(stubborn.join("inner"), b"x").unwrap();

        let mut store = FrameStore::new(dir.path(), 1);
        store.prepare().unwrap();
        store.persist(vec![1], 10).unwrap();

        let newest = dir.path().join("frame-10.png");
        let tracked: Vec<&Path> = store.history().collect();
        assert_eq!(tracked, vec![stubborn.as_path(), newest.as_path()]);

        std::fs::remove_dir_all(&stubborn).unwrap();
        store.persist(vec![2], 20).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(frame_files(dir.path()), vec!["frame-20.png"]);
    }
}
