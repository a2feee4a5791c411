//! Shared pipeline counters and the most recent frame.
//!
//! The render or capture loop writes, the status server reads. Everything
//! sits behind one cheap-to-clone handle.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::display::FlushReport;

/// One encoded frame as it left the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub png: Vec<u8>,
    /// Milliseconds since the Unix epoch.
    pub captured_at: u64,
    /// Where the frame was retained on disk, when it was.
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub frames_dispatched: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub started_at: u64,
}

/// Status payload served at `/api/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub frames_captured: u64,
    pub frames_dispatched: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    pub started_at: u64,
    pub uptime_ms: u64,
    pub frame_interval_ms: u64,
    pub latest_frame: Option<LatestFrame>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestFrame {
    pub captured_at: u64,
    pub file_path: Option<String>,
}

/// Interval reported for a frame rate: `max(1, round(1000 / rate))` ms.
pub fn frame_interval_ms(frame_rate: f64) -> u64 {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return 1;
    }
    ((1000.0 / frame_rate).round() as u64).max(1)
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct Shared {
    stats: Mutex<PipelineStats>,
    latest: Mutex<Option<CapturedFrame>>,
    started: Instant,
    frame_interval: Duration,
}

#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Shared>,
}

impl Telemetry {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            inner: Arc::new(Shared {
                stats: Mutex::new(PipelineStats {
                    started_at: unix_millis(),
                    ..PipelineStats::default()
                }),
                latest: Mutex::new(None),
                started: Instant::now(),
                frame_interval: Duration::from_millis(frame_interval_ms(frame_rate)),
            }),
        }
    }

    // Counters stay valid after a writer panic, so poisoning is ignored.
    fn stats_lock(&self) -> MutexGuard<'_, PipelineStats> {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn latest_lock(&self) -> MutexGuard<'_, Option<CapturedFrame>> {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn frame_interval(&self) -> Duration {
        self.inner.frame_interval
    }

    pub fn record_capture(&self) {
        self.stats_lock().frames_captured += 1;
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let mut stats = self.stats_lock();
        stats.errors += 1;
        stats.last_error = Some(message.into());
    }

    /// Count a flush: one dispatch when any target took the frame, one error
    /// per failing target.
    pub fn record_flush(&self, report: &FlushReport) {
        let mut stats = self.stats_lock();
        if !report.sent.is_empty() {
            stats.frames_dispatched += 1;
        }
        for failure in &report.failures {
            stats.errors += 1;
            stats.last_error = Some(failure.to_string());
        }
    }

    pub fn set_latest(&self, frame: CapturedFrame) {
        *self.latest_lock() = Some(frame);
    }

    pub fn latest(&self) -> Option<CapturedFrame> {
        self.latest_lock().clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats_lock().clone()
    }

    pub fn status(&self) -> StatusReport {
        let stats = self.stats();
        let latest = self.latest_lock().as_ref().map(|frame| LatestFrame {
            captured_at: frame.captured_at,
            file_path: frame
                .file_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        });
        StatusReport {
            frames_captured: stats.frames_captured,
            frames_dispatched: stats.frames_dispatched,
            errors: stats.errors,
            last_error: stats.last_error,
            started_at: stats.started_at,
            uptime_ms: self.inner.started.elapsed().as_millis() as u64,
            frame_interval_ms: self.inner.frame_interval.as_millis() as u64,
            latest_frame: latest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayError, TransportError};

    #[test]
    fn test_frame_interval_rounding() {
        assert_eq!(frame_interval_ms(15.0), 67);
        assert_eq!(frame_interval_ms(30.0), 33);
        assert_eq!(frame_interval_ms(5000.0), 1);
        assert_eq!(frame_interval_ms(0.0), 1);
    }

    #[test]
    fn test_record_flush_counts() {
        let telemetry = Telemetry::new(15.0);
        let report = FlushReport {
            sent: vec!["emulator-0".to_string()],
            failures: vec![DisplayError::Transport {
                target: "tcp-1".to_string(),
                source: TransportError::Unsupported("test".to_string()),
            }],
        };
        telemetry.record_flush(&report);
        telemetry.record_flush(&FlushReport::default());

        let stats = telemetry.stats();
        assert_eq!(stats.frames_dispatched, 1);
        assert_eq!(stats.errors, 1);
        assert!(stats.last_error.unwrap().contains("tcp-1"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let telemetry = Telemetry::new(15.0);
        telemetry.record_capture();
        telemetry.set_latest(CapturedFrame {
            png: vec![1, 2, 3],
            captured_at: 42,
            file_path: Some(PathBuf::from("frames/frame-42.png")),
        });

        let json = serde_json::to_value(telemetry.status()).unwrap();
        assert_eq!(json["framesCaptured"], 1);
        assert_eq!(json["frameIntervalMs"], 67);
        assert_eq!(json["latestFrame"]["capturedAt"], 42);
        assert_eq!(json["latestFrame"]["filePath"], "frames/frame-42.png");
        assert!(json["lastError"].is_null());
    }
}
