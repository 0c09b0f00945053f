//! Byte-counting stream wrapper.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Running byte count for one stream, written by a single producer and read
/// by the progress aggregator.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    read: AtomicU64,
    finished: AtomicBool,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn bytes_read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    /// Mark the stream as finished. Returns `true` only for the first call.
    pub fn finish(&self) -> bool {
        !self.finished.swap(true, Ordering::AcqRel)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Passes reads through unchanged while accounting every byte to a counter.
/// Reaching end-of-stream finishes the counter.
pub struct ProgressTee<R> {
    inner: R,
    counter: Arc<ProgressCounter>,
}

impl<R> ProgressTee<R> {
    pub fn new(inner: R, counter: Arc<ProgressCounter>) -> Self {
        Self { inner, counter }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressTee<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let had_room = buf.remaining() > 0;

        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = buf.filled().len() - before;
                if n > 0 {
                    self.counter.add(n as u64);
                } else if had_room {
                    self.counter.finish();
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_tee_counts_every_byte_and_finishes_once() {
        let data = vec![7u8; 64 * 1024 + 13];
        let counter = Arc::new(ProgressCounter::new());
        let mut tee = ProgressTee::new(io::Cursor::new(data.clone()), counter.clone());

        let mut out = Vec::new();
        tee.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        assert_eq!(counter.bytes_read(), data.len() as u64);
        assert!(counter.is_finished());
        assert!(!counter.finish());
    }

    #[tokio::test]
    async fn test_tee_does_not_finish_before_eof() {
        let counter = Arc::new(ProgressCounter::new());
        let mut tee = ProgressTee::new(io::Cursor::new(vec![1u8; 100]), counter.clone());

        let mut buf = [0u8; 40];
        let n = tee.read(&mut buf).await.unwrap();

        assert_eq!(n, 40);
        assert_eq!(counter.bytes_read(), 40);
        assert!(!counter.is_finished());
    }

    #[test]
    fn test_counter_finish_is_idempotent() {
        let counter = ProgressCounter::new();
        assert!(counter.finish());
        assert!(!counter.finish());
        assert!(counter.is_finished());
    }
}
