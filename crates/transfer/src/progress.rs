use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Window over which [`BatchProgress::bytes_per_second`] is averaged.
const SPEED_WINDOW: Duration = Duration::from_secs(5);

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `total` covered by `done`, rounded to two decimals.
///
/// An empty transfer counts as complete.
pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    round2(done.min(total) as f64 / total as f64 * 100.0)
}

/// Like [`percent`], but only reaches 100 once `done` covers `total`.
///
/// Rounding alone would report `100.00` for a transfer a few bytes short.
pub fn partial_percent(done: u64, total: u64) -> f64 {
    if done >= total {
        return 100.0;
    }
    percent(done, total).min(99.99)
}

/// Suppresses duplicate and backwards progress values.
#[derive(Debug, Default)]
pub struct PercentReporter {
    last: Option<f64>,
}

impl PercentReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(pct)` if `pct` should be reported, i.e. it is higher
    /// than anything reported before.
    pub fn update(&mut self, pct: f64) -> Option<f64> {
        let pct = round2(pct.clamp(0.0, 100.0));
        match self.last {
            Some(last) if pct <= last => None,
            _ => {
                self.last = Some(pct);
                Some(pct)
            }
        }
    }

    /// Last value handed out.
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

// ---------------------------------------------------------------------------
// BatchProgress
// ---------------------------------------------------------------------------

/// Aggregates per-file percentages into an overall, byte-weighted figure.
///
/// The uploader reports progress per task only; consumers that want one
/// number for the whole batch feed those reports through this type.
pub struct BatchProgress {
    inner: Mutex<BatchInner>,
}

struct BatchInner {
    entries: HashMap<u64, Entry>,
    samples: Vec<(Instant, u64)>,
}

struct Entry {
    total_bytes: u64,
    percent: f64,
}

impl Entry {
    fn transferred(&self) -> u64 {
        (self.total_bytes as f64 * self.percent / 100.0).round() as u64
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProgress {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BatchInner {
                entries: HashMap::new(),
                samples: Vec::new(),
            }),
        }
    }

    /// Registers a file of `total_bytes` under `id`.
    pub fn register(&self, id: u64, total_bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        s.entries.insert(
            id,
            Entry {
                total_bytes,
                percent: 0.0,
            },
        );
    }

    /// Records a progress report. Unknown ids are ignored.
    pub fn update(&self, id: u64, pct: f64) {
        let mut s = self.inner.lock().unwrap();
        let Some(entry) = s.entries.get_mut(&id) else {
            return;
        };
        entry.percent = pct.clamp(0.0, 100.0);

        let now = Instant::now();
        let transferred = s.entries.values().map(Entry::transferred).sum();
        s.samples.push((now, transferred));
        let cutoff = now.checked_sub(SPEED_WINDOW).unwrap_or(now);
        s.samples.retain(|(at, _)| *at >= cutoff);
    }

    /// Sum of all registered file sizes.
    pub fn total_bytes(&self) -> u64 {
        let s = self.inner.lock().unwrap();
        s.entries.values().map(|e| e.total_bytes).sum()
    }

    /// Bytes transferred so far, estimated from reported percentages.
    pub fn transferred_bytes(&self) -> u64 {
        let s = self.inner.lock().unwrap();
        s.entries.values().map(Entry::transferred).sum()
    }

    /// Overall percentage, weighted by file size.
    pub fn overall(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let total: u64 = s.entries.values().map(|e| e.total_bytes).sum();
        if total == 0 {
            // Only empty files (or nothing): average the raw percentages.
            if s.entries.is_empty() {
                return 0.0;
            }
            let sum: f64 = s.entries.values().map(|e| e.percent).sum();
            return round2(sum / s.entries.len() as f64);
        }
        let done: u64 = s.entries.values().map(Entry::transferred).sum();
        percent(done, total)
    }

    /// Average throughput over the last few seconds. `0.0` with fewer than
    /// two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let (Some(first), Some(last)) = (s.samples.first(), s.samples.last()) else {
            return 0.0;
        };
        let elapsed = last.0.duration_since(first.0);
        if elapsed.is_zero() {
            return 0.0;
        }
        last.1.saturating_sub(first.1) as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time until every registered file is done.
    pub fn eta(&self) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        let remaining = self.total_bytes().saturating_sub(self.transferred_bytes());
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }
}
