//! Fixed-delay throttling between API pages.
//!
//! arXiv asks bulk clients to wait a few seconds between query calls. The
//! [`PageThrottle`] applies that pause unconditionally after every page; it is
//! not adaptive and does not look at response headers.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use arxin_core::PageThrottle;
//!
//! # async fn example() {
//! let throttle = PageThrottle::new(Duration::from_secs(3));
//! throttle.wait().await; // pauses for three seconds
//! assert_eq!(throttle.waits(), 1);
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, instrument, warn};

/// Delay between API calls recommended by arXiv.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(3);

/// Cumulative pause after which a warning is logged once.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(600);

/// Sleeps a fixed delay each time [`PageThrottle::wait`] is called.
#[derive(Debug)]
pub struct PageThrottle {
    delay: Duration,

    /// Whether sleeping is skipped (`request_delay_ms = 0`, tests).
    disabled: bool,

    /// Number of completed waits, counted even when disabled.
    waits: AtomicU64,

    /// Total time slept so far, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl PageThrottle {
    /// Creates a throttle that sleeps `delay` per page.
    ///
    /// A zero delay behaves like [`PageThrottle::disabled`].
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = delay.as_millis()))]
    pub fn new(delay: Duration) -> Self {
        debug!("creating page throttle");
        Self {
            delay,
            disabled: delay.is_zero(),
            waits: AtomicU64::new(0),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a throttle that never sleeps but still counts waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            delay: Duration::ZERO,
            disabled: true,
            waits: AtomicU64::new(0),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of times [`PageThrottle::wait`] has completed.
    #[must_use]
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::SeqCst)
    }

    /// Total time actually slept.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Pauses for the configured delay.
    pub async fn wait(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if self.disabled {
            return;
        }

        let cumulative = self.add_cumulative_delay(self.delay);
        debug!(
            delay_ms = self.delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "throttling before next page"
        );

        // Warn on the wait that crosses the threshold, not on every later one.
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
            && cumulative.saturating_sub(self.delay) < CUMULATIVE_DELAY_WARNING_THRESHOLD
        {
            warn!(
                cumulative_delay_secs = cumulative.as_secs(),
                "long backfill - throttling has paused for over ten minutes so far"
            );
        }

        tokio::time::sleep(self.delay).await;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

impl Default for PageThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_DELAY)
    }
}
