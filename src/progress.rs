use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// How often should progress bars be redrawn?
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

lazy_static! {
    static ref INDEFINITE_COUNT_STYLE: ProgressStyle =
        ProgressStyle::with_template("{spinner} {msg} {human_pos} [{elapsed_precise}]")
            .expect("progress bar style template should compile");

    static ref INDEFINITE_COUNT_FINISH_STYLE: ProgressStyle =
        ProgressStyle::with_template("{msg} [{elapsed_precise}]")
            .expect("progress bar style template should compile");

    // NOTE: indicatif uses an estimation algorithm for ETA and throughput that
    //       doesn't work well for this use case. Until that changes we avoid
    //       showing ETAs and rates.
    //
    //       See https://github.com/console-rs/indicatif/issues/394.

    static ref DEFINITE_UNITLESS_STYLE: ProgressStyle =
        ProgressStyle::with_template("{msg}  {bar} {percent:>3}%  {pos}/{len}  [{elapsed_precise}]")
            .expect("progress bar style template should compile");
}

/// Wraps an `indicatif::ProgressBar` with a local counter so that the
/// terminal is only touched every `PROGRESS_UPDATE_INTERVAL`, however often
/// the survey publishes. Publication is best-effort and never affects the
/// statistics being gathered.
pub struct Progress {
    inc_since_sync: u64,
    last_sync: Instant,
    inner: ProgressBar,
    finish_style: Option<ProgressStyle>,
}

impl Progress {
    /// An indefinite item counter, for phases whose total is unknown up
    /// front (object walking, ref enumeration).
    pub fn new_counter_spinner<T: Into<Cow<'static, str>>>(message: T, enabled: bool) -> Self {
        let inner = if enabled {
            let inner = ProgressBar::new_spinner()
                .with_style(INDEFINITE_COUNT_STYLE.clone())
                .with_message(message);

            inner.enable_steady_tick(PROGRESS_UPDATE_INTERVAL);

            inner
        } else {
            ProgressBar::hidden()
        };

        Progress {
            inc_since_sync: 0,
            last_sync: Instant::now(),
            inner,
            finish_style: Some(INDEFINITE_COUNT_FINISH_STYLE.clone()),
        }
    }

    /// A definite bar over a known item count (name-rev resolutions).
    pub fn new_bar<T: Into<Cow<'static, str>>>(total: u64, message: T, enabled: bool) -> Self {
        let inner = if enabled {
            let inner = ProgressBar::new(total)
                .with_style(DEFINITE_UNITLESS_STYLE.clone())
                .with_message(message);

            inner.enable_steady_tick(PROGRESS_UPDATE_INTERVAL);

            inner
        } else {
            ProgressBar::hidden()
        };

        Progress {
            inc_since_sync: 0,
            last_sync: Instant::now(),
            inner,
            finish_style: None,
        }
    }

    #[inline]
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.inner.suspend(f)
    }

    #[inline]
    pub fn inc(&mut self, items: u64) {
        self.inc_since_sync += items;
        if self.last_sync.elapsed() >= PROGRESS_UPDATE_INTERVAL {
            self.sync();
        }
    }

    pub fn finish_with_message<T: Into<Cow<'static, str>>>(&mut self, message: T) {
        self.sync();
        if let Some(style) = &self.finish_style {
            self.inner.set_style(style.clone());
        }
        self.inner.finish_with_message(message);
    }

    pub fn finish(&mut self) {
        self.sync();
        if let Some(style) = &self.finish_style {
            self.inner.set_style(style.clone());
        }
        self.inner.finish();
    }

    fn sync(&mut self) {
        self.inner.inc(self.inc_since_sync);
        self.inc_since_sync = 0;
        self.last_sync = Instant::now();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.sync();
    }
}
