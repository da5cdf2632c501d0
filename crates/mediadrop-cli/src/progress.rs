// Upload progress accounting
//
// A ProgressReader wraps the body of one upload and reports every read as a
// (loaded, total) progress event.

use std::io::{self, Read};
use std::sync::Arc;

/// Callback receiving `(loaded, total)` byte counts.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Converts a progress event to a whole percentage, rounding half up.
///
/// An empty body counts as complete.
pub fn percent_completed(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (loaded.saturating_mul(100) + total / 2) / total;
    percent.min(100) as u8
}

/// Reader that reports how much of the wrapped reader has been consumed.
pub struct ProgressReader<R> {
    inner: R,
    loaded: u64,
    total: u64,
    on_progress: ProgressFn,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total: u64, on_progress: ProgressFn) -> Self {
        Self {
            inner,
            loaded: 0,
            total,
            on_progress,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.loaded += n as u64;
            (self.on_progress)(self.loaded, self.total);
        }
        Ok(n)
    }
}
