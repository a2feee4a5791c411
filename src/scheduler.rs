//! Fixed-rate frame scheduler with drift correction.
//!
//! [`TickClock`] holds the timing arithmetic and is driven by explicit
//! instants. [`Ticker`] runs a clock against tokio's timer and awaits the
//! handler before considering the next tick, so ticks never overlap.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::Notify;
use tokio::time::Instant;

/// One scheduler firing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Time since the previous tick in units of the target interval
    /// (1.0 = exactly on rate).
    pub delta_time: f64,
    /// Time since the clock started.
    pub elapsed: Duration,
}

/// Interval for a frame rate; non-positive or non-finite rates clamp to 1 fps.
pub fn interval_for(fps: f64) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f64(1.0 / fps)
    } else {
        Duration::from_secs(1)
    }
}

/// Pure tick arithmetic.
#[derive(Debug, Clone)]
pub struct TickClock {
    interval: Duration,
    started: Instant,
    last: Instant,
}

impl TickClock {
    pub fn new(fps: f64, now: Instant) -> Self {
        Self {
            interval: interval_for(fps),
            started: now,
            last: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Earliest instant at which [`poll`](Self::poll) will fire.
    pub fn next_due(&self) -> Instant {
        self.last + self.interval
    }

    /// Fire if at least one interval has passed since the last reference.
    ///
    /// The reference advances to `now - (elapsed mod interval)`, keeping the
    /// phase so late ticks do not accumulate drift.
    pub fn poll(&mut self, now: Instant) -> Option<Tick> {
        let since_last = now.saturating_duration_since(self.last);
        if since_last < self.interval {
            return None;
        }

        let interval_ns = self.interval.as_nanos().max(1);
        let remainder = since_last.as_nanos() % interval_ns;
        self.last = now - Duration::from_nanos(remainder as u64);

        Some(Tick {
            delta_time: since_last.as_secs_f64() / self.interval.as_secs_f64(),
            elapsed: now.saturating_duration_since(self.started),
        })
    }
}

/// Receives ticks from a [`Ticker`].
pub trait TickHandler: Send {
    fn on_tick(&mut self, tick: Tick) -> impl Future<Output = ()> + Send;
}

/// Cloneable stop switch for a running [`Ticker`].
#[derive(Debug, Clone, Default)]
pub struct TickerHandle {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl TickerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the ticker at its next loop boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

#[derive(Debug, Clone)]
pub struct Ticker {
    fps: f64,
    handle: TickerHandle,
}

impl Ticker {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            handle: TickerHandle::default(),
        }
    }

    pub fn handle(&self) -> TickerHandle {
        self.handle.clone()
    }

    /// Drive `handler` until stopped.
    ///
    /// Returns `false` without doing anything if this ticker is already
    /// running.
    pub async fn start<H: TickHandler>(&self, handler: &mut H) -> bool {
        if self.handle.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let mut clock = TickClock::new(self.fps, Instant::now());
        debug!("Ticker started at {:?} per frame", clock.interval());

        while self.handle.is_running() {
            tokio::select! {
                _ = tokio::time::sleep_until(clock.next_due()) => {}
                _ = self.handle.wake.notified() => {}
            }
            if !self.handle.is_running() {
                break;
            }
            if let Some(tick) = clock.poll(Instant::now()) {
                handler.on_tick(tick).await;
            }
        }

        debug!("Ticker stopped");
        true
    }
}
