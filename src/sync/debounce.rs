//! Scrub input debouncing.
//!
//! Raw scrubber offsets arrive at pointer-event rate. The debouncer keeps only
//! the newest value and forwards it once no input has arrived for a full
//! quiescence window.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Receiver of settled scrub offsets.
#[async_trait]
pub trait ScrubSink: Send + Sync + 'static {
    async fn scrub_to(&self, offset_ms: u32);
}

#[async_trait]
impl ScrubSink for mpsc::Sender<u32> {
    async fn scrub_to(&self, offset_ms: u32) {
        if let Err(e) = self.send(offset_ms).await {
            tracing::error!("Failed to forward settled scrub offset: {}", e);
        }
    }
}

/// Trailing-edge debouncer in front of a [`ScrubSink`].
pub struct ScrubDebouncer {
    input: mpsc::UnboundedSender<u32>,
    task: JoinHandle<()>,
}

impl ScrubDebouncer {
    pub fn spawn<S: ScrubSink>(window: Duration, sink: S) -> Self {
        let (input, mut rx) = mpsc::unbounded_channel::<u32>();

        let task = tokio::spawn(async move {
            let mut pending: Option<u32> = None;
            let settle = tokio::time::sleep(window);
            tokio::pin!(settle);

            loop {
                tokio::select! {
                    raw = rx.recv() => match raw {
                        Some(offset_ms) => {
                            pending = Some(offset_ms);
                            settle.as_mut().reset(Instant::now() + window);
                        }
                        None => break,
                    },

                    () = &mut settle, if pending.is_some() => {
                        if let Some(offset_ms) = pending.take() {
                            tracing::trace!(offset_ms, "Scrub settled");
                            sink.scrub_to(offset_ms).await;
                        }
                    }
                }
            }

            // Input closed mid-burst: the last value still settles.
            if let Some(offset_ms) = pending {
                settle.await;
                sink.scrub_to(offset_ms).await;
            }
        });

        Self { input, task }
    }

    /// Record a raw scrubber offset.
    pub fn push(&self, offset_ms: u32) {
        if self.input.send(offset_ms).is_err() {
            tracing::warn!("Scrub debouncer has stopped; dropping offset {}", offset_ms);
        }
    }

    /// Stop accepting input and wait for any pending value to be delivered.
    pub async fn close(self) {
        drop(self.input);
        if let Err(e) = self.task.await {
            tracing::error!("Scrub debouncer task failed: {}", e);
        }
    }
}
