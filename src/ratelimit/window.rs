//! Sliding window of fixed-width time buckets.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ring::Ring;

/// One time slice of a window, stamped with the instant it was opened.
///
/// A bucket without a timestamp is retired and counts for nothing. The
/// counter is shared with any outstanding [`BucketHandle`] so increments can
/// land after the window lock has been released.
#[derive(Debug)]
struct Bucket {
    timestamp: Option<Instant>,
    count: Arc<AtomicU64>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            timestamp: None,
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    fn reset(&mut self) {
        self.timestamp = None;
        self.count.store(0, Ordering::Relaxed);
    }

    fn is_within(&self, duration: Duration, now: Instant) -> bool {
        match self.timestamp {
            Some(ts) => now.saturating_duration_since(ts) < duration,
            None => false,
        }
    }
}

/// Handle to the counter of the bucket that should receive an event.
///
/// Incrementing through the handle is lock-free and safe from any thread.
#[derive(Debug, Clone)]
pub struct BucketHandle {
    count: Arc<AtomicU64>,
}

impl BucketHandle {
    /// Add one event. Returns the bucket count after the increment.
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Add `hits` events. Returns the bucket count after the addition.
    pub fn add(&self, hits: u64) -> u64 {
        self.count.fetch_add(hits, Ordering::Relaxed) + hits
    }

    /// Current count of the bucket.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Event counts over the most recent `size`, kept at `precision` granularity.
///
/// The window holds `floor(size / precision) + 1` buckets in a ring. Buckets
/// that have aged past `size` are retired lazily by [`current_bucket`], never
/// by [`total_in_duration`], so the read path does not move cursors.
///
/// [`current_bucket`]: SlidingWindow::current_bucket
/// [`total_in_duration`]: SlidingWindow::total_in_duration
#[derive(Debug)]
pub struct SlidingWindow {
    ring: Mutex<Ring<Bucket>>,
    size: Duration,
    precision: Duration,
}

impl SlidingWindow {
    /// Create a window answering queries up to `size` in the past.
    ///
    /// # Panics
    ///
    /// Panics if `precision` is zero.
    pub fn new(size: Duration, precision: Duration) -> Self {
        assert!(!precision.is_zero(), "window precision must be non-zero");
        let capacity = bucket_capacity(size, precision);
        let buckets = (0..capacity).map(|_| Bucket::new()).collect();

        Self {
            ring: Mutex::new(Ring::new(buckets)),
            size,
            precision,
        }
    }

    /// Longest duration this window retains events for.
    pub fn size(&self) -> Duration {
        self.size
    }

    /// Width of one bucket.
    pub fn precision(&self) -> Duration {
        self.precision
    }

    /// Number of bucket slots allocated for this window.
    pub fn bucket_capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Resolve the bucket that should receive an event observed at `now`.
    ///
    /// Expired buckets are retired and reset first. If events are still
    /// resident, the newest cursor moves forward by the number of whole
    /// precision steps since the newest bucket was opened; zero steps reuses
    /// the newest bucket. A newly claimed bucket is stamped with `now`, so a
    /// bucket's timestamp is always the instant it was opened.
    pub fn current_bucket(&self, now: Instant) -> BucketHandle {
        let mut ring = self.ring.lock();

        while let Some(oldest) = ring.oldest_mut() {
            if oldest.is_within(self.size, now) {
                break;
            }
            oldest.reset();
            ring.retire(1);
        }

        let steps = match ring.newest().and_then(|bucket| bucket.timestamp) {
            Some(opened) => self.steps_between(opened, now),
            None if ring.is_empty() => 1,
            // newest is always stamped while resident
            None => 0,
        };
        ring.advance(steps);

        let bucket = match ring.newest_mut() {
            Some(bucket) => bucket,
            None => unreachable!("ring is non-empty after advancing"),
        };
        // restamping a reused bucket would pin a steady stream to one slot
        if steps > 0 {
            bucket.timestamp = Some(now);
        }

        BucketHandle {
            count: Arc::clone(&bucket.count),
        }
    }

    /// Sum of the events recorded less than `duration` before `now`.
    ///
    /// Buckets still resident but older than `duration` are skipped, which
    /// is what lets one window serve every rule shorter than its size.
    pub fn total_in_duration(&self, duration: Duration, now: Instant) -> u64 {
        let ring = self.ring.lock();
        ring.iter()
            .filter(|bucket| bucket.is_within(duration, now))
            .map(|bucket| bucket.count.load(Ordering::Relaxed))
            .sum()
    }

    fn steps_between(&self, opened: Instant, now: Instant) -> usize {
        let elapsed = now.saturating_duration_since(opened).as_nanos();
        let steps = elapsed / self.precision.as_nanos();
        usize::try_from(steps).unwrap_or(usize::MAX)
    }
}

fn bucket_capacity(size: Duration, precision: Duration) -> usize {
    let whole = size.as_nanos() / precision.as_nanos();
    usize::try_from(whole).unwrap_or(usize::MAX).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_capacity_covers_size_plus_one() {
        assert_eq!(SlidingWindow::new(SECOND * 10, SECOND).bucket_capacity(), 11);
        assert_eq!(SlidingWindow::new(SECOND, ms(100)).bucket_capacity(), 11);
        assert_eq!(SlidingWindow::new(ms(250), ms(100)).bucket_capacity(), 3);
        assert_eq!(SlidingWindow::new(Duration::ZERO, ms(100)).bucket_capacity(), 1);
    }

    #[test]
    fn test_bucket_progression_over_more_than_one_window() {
        let window = SlidingWindow::new(SECOND * 10, SECOND);
        let start = Instant::now();

        // 13 ticks over an 11-slot ring forces retirement to keep pace
        for i in 0..13u32 {
            let handle = window.current_bucket(start + SECOND * i);
            assert_eq!(handle.increment(), 1);
        }

        let now = start + SECOND * 12;
        assert_eq!(window.total_in_duration(SECOND * 10, now), 10);
        assert_eq!(window.total_in_duration(SECOND, now), 1);
    }

    #[test]
    fn test_events_in_same_tick_share_bucket() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        let first = window.current_bucket(start);
        first.increment();
        let second = window.current_bucket(start + ms(40));
        second.increment();

        assert_eq!(first.count(), 2);
        assert_eq!(second.count(), 2);
    }

    #[test]
    fn test_steady_stream_faster_than_precision_still_slides() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        for i in 0..60u64 {
            window.current_bucket(start + ms(i * 50)).increment();
        }

        // buckets opened at 2000..=2900ms, two events each
        assert_eq!(window.total_in_duration(SECOND, start + ms(2950)), 20);
    }

    #[test]
    fn test_bucket_ages_from_the_instant_it_was_opened() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        window.current_bucket(start).increment();
        window.current_bucket(start + ms(90)).increment();

        // the 90ms event lives in the bucket opened at 0 and expires with it
        assert_eq!(window.total_in_duration(SECOND, start + ms(999)), 2);
        assert_eq!(window.total_in_duration(SECOND, start + SECOND), 0);
    }

    #[test]
    fn test_total_is_independent_of_bucket_boundaries() {
        let start = Instant::now();
        let size = SECOND * 2;

        for spacing in [1u64, 7, 33, 99, 100, 150, 250] {
            let window = SlidingWindow::new(size, ms(100));
            let mut inserted = 0;
            let mut t = Duration::ZERO;
            while t < size {
                window.current_bucket(start + t).increment();
                inserted += 1;
                t += ms(spacing);
            }

            let now = start + t - ms(spacing);
            assert_eq!(
                window.total_in_duration(size, now),
                inserted,
                "spacing {spacing}ms"
            );
        }
    }

    #[test]
    fn test_expired_events_are_not_counted() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        window.current_bucket(start).increment();

        assert_eq!(window.total_in_duration(SECOND, start + ms(999)), 1);
        assert_eq!(window.total_in_duration(SECOND, start + SECOND), 0);
        assert_eq!(window.total_in_duration(SECOND, start + ms(1001)), 0);
    }

    #[test]
    fn test_shorter_durations_never_exceed_longer() {
        let window = SlidingWindow::new(SECOND * 5, ms(100));
        let start = Instant::now();

        for i in 0..50u64 {
            let handle = window.current_bucket(start + ms(i * 97));
            handle.add(i % 3 + 1);
        }

        let now = start + ms(49 * 97);
        let durations = [ms(0), ms(100), ms(500), SECOND, SECOND * 2, SECOND * 5];
        let totals: Vec<u64> = durations
            .iter()
            .map(|d| window.total_in_duration(*d, now))
            .collect();

        assert!(totals.windows(2).all(|pair| pair[0] <= pair[1]), "{totals:?}");
        assert_eq!(totals[0], 0);
    }

    #[test]
    fn test_idle_gap_longer_than_window_starts_fresh() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        for i in 0..5u64 {
            window.current_bucket(start + ms(i * 100)).increment();
        }

        let later = start + SECOND * 30;
        let handle = window.current_bucket(later);
        assert_eq!(handle.count(), 0);
        handle.increment();

        assert_eq!(window.total_in_duration(SECOND, later), 1);
    }

    #[test]
    fn test_partial_gap_keeps_recent_buckets() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        window.current_bucket(start).add(4);
        window.current_bucket(start + ms(600)).add(2);
        window.current_bucket(start + ms(1200)).add(1);

        let now = start + ms(1200);
        // the first bucket aged out, the one from 600ms remains
        assert_eq!(window.total_in_duration(SECOND, now), 3);
        assert_eq!(window.total_in_duration(ms(500), now), 1);
    }

    #[test]
    fn test_empty_window_total_is_zero() {
        let window = SlidingWindow::new(SECOND, ms(100));
        assert_eq!(window.total_in_duration(SECOND, Instant::now()), 0);
    }

    #[test]
    fn test_stale_reader_instant_counts_newer_bucket() {
        let window = SlidingWindow::new(SECOND, ms(100));
        let start = Instant::now();

        window.current_bucket(start + ms(50)).increment();

        // a reader that sampled the clock just before the writer
        assert_eq!(window.total_in_duration(SECOND, start), 1);
    }

    #[test]
    #[should_panic(expected = "precision must be non-zero")]
    fn test_zero_precision_panics() {
        let _ = SlidingWindow::new(SECOND, Duration::ZERO);
    }
}
