use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::clock::Clock;
use super::percentiles::LatencyPercentiles;

// ─── Configuration ───────────────────────────────────────────────

/// Rate accounting is folded into the moving average every 5 s.
const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;
const TICK_INTERVAL_SECS: f64 = 5.0;

/// Averaging window the decay factor is tuned for.
const WINDOW_SECS: f64 = 60.0;

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// Weight of a single tick: `1 - e^(-tick / window)`.
fn alpha() -> f64 {
    1.0 - (-TICK_INTERVAL_SECS / WINDOW_SECS).exp()
}

// ─── Public types ────────────────────────────────────────────────

/// Per-method timer: call count, last duration, a latency histogram and an
/// exponentially weighted one-minute rate in calls per second.
///
/// The moving average is advanced lazily. Every `record` first folds any
/// elapsed 5 s ticks into the rate, so a timer that stops receiving calls
/// decays toward zero the next time it is read.
pub struct DecayingTimer {
    clock: Arc<dyn Clock>,
    created_at: u64,
    inner: Mutex<Inner>,
}

/// Read-only view of a timer, served by the monitoring API.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub one_minute_rate: f64,
    pub mean_rate: f64,
    pub last_duration_us: u64,
    pub latency: LatencyPercentiles,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    count: u64,
    /// Events since the last tick, not yet part of `rate`.
    uncounted: u64,
    /// Events per second.
    rate: f64,
    /// The first tick seeds `rate` instead of blending into it.
    initialized: bool,
    last_tick: u64,
    last_duration: Duration,
    latency: Histogram<u64>,
}

impl Inner {
    /// Rate after `ticks` elapsed intervals, the first carrying
    /// `uncounted` events and the rest carrying none.
    fn decayed_rate(&self, ticks: u64) -> f64 {
        let alpha = alpha();
        let instant_rate = self.uncounted as f64 / TICK_INTERVAL_SECS;
        let first = if self.initialized {
            self.rate + alpha * (instant_rate - self.rate)
        } else {
            instant_rate
        };
        let idle = ticks.saturating_sub(1).min(i32::MAX as u64) as i32;
        first * (1.0 - alpha).powi(idle)
    }

    fn pending_ticks(&self, now: u64) -> u64 {
        let age = now.saturating_sub(self.last_tick);
        if age > TICK_INTERVAL_NANOS {
            age / TICK_INTERVAL_NANOS
        } else {
            0
        }
    }

    fn tick_if_necessary(&mut self, now: u64) {
        let ticks = self.pending_ticks(now);
        if ticks == 0 {
            return;
        }
        let age = now - self.last_tick;
        self.rate = self.decayed_rate(ticks);
        self.initialized = true;
        self.uncounted = 0;
        self.last_tick = now - age % TICK_INTERVAL_NANOS;
    }
}

// ─── DecayingTimer impl ──────────────────────────────────────────

impl DecayingTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_nanos();
        Self {
            clock,
            created_at: now,
            inner: Mutex::new(Inner {
                count: 0,
                uncounted: 0,
                rate: 0.0,
                initialized: false,
                last_tick: now,
                last_duration: Duration::ZERO,
                latency: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                    .expect("histogram creation"),
            }),
        }
    }

    /// Record one completed call.
    pub fn record(&self, duration: Duration) {
        let now = self.clock.now_nanos();
        let mut inner = self.inner.lock();
        inner.tick_if_necessary(now);
        inner.count += 1;
        inner.uncounted += 1;
        inner.last_duration = duration;
        // clamp to ≥ 1 μs, saturate at the histogram ceiling
        let us = (duration.as_micros() as u64).max(HIST_LOW);
        inner.latency.saturating_record(us);
    }

    /// Calls per second, exponentially decayed over one minute.
    ///
    /// Pending ticks are projected onto a copy of the rate, so reading
    /// never changes what the next reader sees.
    pub fn one_minute_rate(&self) -> f64 {
        let now = self.clock.now_nanos();
        let inner = self.inner.lock();
        match inner.pending_ticks(now) {
            0 if inner.initialized => inner.rate,
            0 => 0.0,
            ticks => inner.decayed_rate(ticks),
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn last_duration(&self) -> Duration {
        self.inner.lock().last_duration
    }

    /// Average calls per second since the timer was created.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        let elapsed = self.clock.now_nanos().saturating_sub(self.created_at);
        if count == 0 || elapsed == 0 {
            return 0.0;
        }
        count as f64 / Duration::from_nanos(elapsed).as_secs_f64()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let one_minute_rate = self.one_minute_rate();
        let mean_rate = self.mean_rate();
        let inner = self.inner.lock();
        TimerSnapshot {
            count: inner.count,
            one_minute_rate,
            mean_rate,
            last_duration_us: inner.last_duration.as_micros() as u64,
            latency: LatencyPercentiles::from_histogram(&inner.latency),
        }
    }
}

impl std::fmt::Debug for DecayingTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecayingTimer")
            .field("count", &self.count())
            .field("one_minute_rate", &self.one_minute_rate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::clock::ManualClock;

    const TICK: Duration = Duration::from_secs(5);

    fn timer() -> (Arc<ManualClock>, DecayingTimer) {
        let clock = Arc::new(ManualClock::new());
        let timer = DecayingTimer::new(clock.clone());
        (clock, timer)
    }

    fn record_n(timer: &DecayingTimer, n: usize) {
        for _ in 0..n {
            timer.record(Duration::from_millis(3));
        }
    }

    #[test]
    fn count_tracks_every_record() {
        let (clock, timer) = timer();
        for i in 0..250u64 {
            timer.record(Duration::from_micros(i * 10));
            clock.advance(Duration::from_millis(40));
        }
        assert_eq!(timer.count(), 250);
        assert_eq!(timer.last_duration(), Duration::from_micros(2490));
    }

    #[test]
    fn rate_is_zero_before_the_first_tick() {
        let (_clock, timer) = timer();
        record_n(&timer, 100);
        assert_eq!(timer.one_minute_rate(), 0.0);
    }

    #[test]
    fn first_tick_seeds_the_instant_rate() {
        let (clock, timer) = timer();
        record_n(&timer, 30);
        clock.advance(TICK + Duration::from_millis(1));
        assert!((timer.one_minute_rate() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn reading_the_rate_does_not_mutate_it() {
        let (clock, timer) = timer();
        record_n(&timer, 20);
        clock.advance(TICK * 3);
        let first = timer.one_minute_rate();
        let second = timer.one_minute_rate();
        assert_eq!(first, second);
    }

    #[test]
    fn constant_load_converges_to_the_true_rate() {
        let (clock, timer) = timer();
        // 10 calls per second for three minutes
        for _ in 0..1800 {
            timer.record(Duration::from_millis(1));
            clock.advance(Duration::from_millis(100));
        }
        let rate = timer.one_minute_rate();
        assert!((rate - 10.0).abs() < 0.5, "rate was {rate}");
    }

    #[test]
    fn quiet_period_decays_toward_zero() {
        let (clock, timer) = timer();
        for _ in 0..600 {
            timer.record(Duration::from_millis(1));
            clock.advance(Duration::from_millis(100));
        }
        let busy = timer.one_minute_rate();
        clock.advance(Duration::from_secs(15 * 60));
        let quiet = timer.one_minute_rate();
        assert!(quiet >= 0.0);
        assert!(quiet < busy / 100.0, "busy {busy}, quiet {quiet}");
    }

    #[test]
    fn rate_is_bounded_by_the_peak_instant_rate() {
        let (clock, timer) = timer();
        for burst in [50usize, 5, 200, 0, 80] {
            record_n(&timer, burst);
            clock.advance(TICK + Duration::from_millis(1));
            let rate = timer.one_minute_rate();
            assert!(rate >= 0.0);
            assert!(rate <= 200.0 / 5.0 + 1e-9, "rate was {rate}");
        }
    }

    #[test]
    fn very_long_idle_gaps_stay_finite() {
        let (clock, timer) = timer();
        record_n(&timer, 10);
        clock.advance(Duration::from_secs(60 * 60 * 24 * 365));
        let rate = timer.one_minute_rate();
        assert!(rate.is_finite());
        assert!(rate >= 0.0);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let clock = Arc::new(ManualClock::new());
        let timer = Arc::new(DecayingTimer::new(clock));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let timer = timer.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        timer.record(Duration::from_micros(50));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(timer.count(), 8_000);
    }

    #[test]
    fn snapshot_carries_latency_percentiles() {
        let (clock, timer) = timer();
        for ms in 1..=100u64 {
            timer.record(Duration::from_millis(ms));
        }
        clock.advance(Duration::from_secs(10));
        let snap = timer.snapshot();
        assert_eq!(snap.count, 100);
        assert_eq!(snap.last_duration_us, 100_000);
        assert!(snap.latency.p50_us >= 49_000 && snap.latency.p50_us <= 51_000);
        assert!(snap.mean_rate > 9.9 && snap.mean_rate < 10.1);
    }
}
